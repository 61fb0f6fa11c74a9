use std::fs;

use perfscan_core::detectors::Detector;
use perfscan_core::engine::scan;
use perfscan_core::ir::{InstId, Program, ProgramBuilder};
use perfscan_core::loops::LoopTable;
use perfscan_core::report::FindingContext;
use perfscan_core::source::LocationResolver;
use tempfile::{tempdir, TempDir};

const TREE_CPP: &[&str] = &[
    "void prune(Node* n) {",
    "  for (int i = 0; i < a; i++) {",
    "    for (int j = 0; j < b; j++) {",
    "      n->RemoveChildAt(j);",
    "    }",
    "  }",
    "  n->RemoveChildAt(0);",
    "}",
];

/// `prune` with one `RemoveChildAt` call two loops deep and one after the loops.
/// Returns the call that sits after the loops.
fn nested_loops(tmp: &TempDir, locate_tail_call: bool) -> (Program, LoopTable, InstId) {
    fs::write(tmp.path().join("tree.cpp"), TREE_CPP.join("\n")).expect("write tree.cpp");
    let dir = tmp.path().to_string_lossy().to_string();

    let mut b = ProgramBuilder::new();
    let void = b.void();
    let i32_ty = b.int(32);
    let remove = b.function("_ZN4Node13RemoveChildAtEj", void, vec![i32_ty]);
    let prune = b.function("prune", void, vec![]);
    let entry = b.block(prune, "entry");
    let outer = b.block(prune, "outer");
    let inner = b.block(prune, "inner");
    let exit = b.block(prune, "exit");
    let flag = b.const_int(1, 1);
    let zero = b.const_int(32, 0);

    b.at(&dir, "tree.cpp", 1);
    b.br(entry, outer);
    b.at(&dir, "tree.cpp", 2);
    b.cond_br(outer, flag, inner, exit);
    b.at(&dir, "tree.cpp", 4);
    b.call(inner, remove, vec![zero.into()]);
    b.at(&dir, "tree.cpp", 3);
    b.cond_br(inner, flag, inner, outer);
    if locate_tail_call {
        b.at(&dir, "tree.cpp", 7);
    } else {
        b.set_loc(None);
    }
    let tail = b.call(exit, remove, vec![zero.into()]);
    b.at(&dir, "tree.cpp", 8);
    b.ret(exit, None);

    let outer_loop = b.add_loop(prune, outer, vec![outer, inner], 1, None);
    b.add_loop(prune, inner, vec![inner], 2, Some(outer_loop));
    let (program, loops) = b.finish().expect("valid program");
    (program, loops, tail)
}

#[test]
fn remove_child_at_two_loops_deep_is_reported_once() {
    let tmp = tempdir().expect("tempdir");
    let (program, loops, _) = nested_loops(&tmp, true);

    let findings = scan(Detector::MozillaBug35294, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(findings.len(), 1, "only the call inside the loops is reported");

    let finding = &findings[0];
    assert_eq!(finding.bug, "MozillaBug35294");
    assert_eq!(finding.function.as_deref(), Some("prune"));
    let site = finding.primary().expect("primary site");
    assert_eq!(site.location.line, 4);
    assert_eq!(site.text, "      n->RemoveChildAt(j);");
    assert_eq!(finding.context, vec![FindingContext::LoopDepth { depth: 2 }]);

    let text = finding.to_string();
    assert!(text.contains("tree.cpp:4"), "unexpected output: {text}");
    assert!(text.contains("LoopDepth: 2"), "unexpected output: {text}");
}

#[test]
fn other_loop_call_detectors_share_the_same_search() {
    let tmp = tempdir().expect("tempdir");
    let (program, loops, _) = nested_loops(&tmp, true);

    let any_call = scan(Detector::LoopNestedCallSites, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(any_call.len(), 1);
    assert_eq!(any_call[0].bug, "LoopNestedCallSites");

    let appends = scan(Detector::MozillaBug311566, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert!(appends.is_empty(), "no Append( call in the source");
}

#[test]
fn calls_without_debug_info_are_skipped() {
    let tmp = tempdir().expect("tempdir");
    let (program, loops, tail) = nested_loops(&tmp, false);
    assert!(program.inst(tail).loc.is_none());

    let findings = scan(Detector::MozillaBug35294, &program, &loops, LocationResolver::new())
        .expect("an unlocated call is not fatal");
    assert_eq!(findings.len(), 1, "the located call inside the loops is still reported");
    assert_eq!(findings[0].primary().map(|s| s.location.line), Some(4));

    let any_call = scan(Detector::LoopNestedCallSites, &program, &loops, LocationResolver::new())
        .expect("an unlocated call is not fatal");
    assert_eq!(any_call.len(), 1);
}

#[test]
fn query_interface_in_loop_carries_a_source_excerpt() {
    let tmp = tempdir().expect("tempdir");
    let source = [
        "void Refresh(nsISupports* s) {",
        "  nsresult rv;",
        "  while (more) {",
        "    nsCOMPtr<nsIFoo> foo = do_QueryInterface(s, &rv);",
        "    if (!foo) break;",
        "  }",
        "  Done();",
        "}",
        "// trailer",
    ];
    fs::write(tmp.path().join("refresh.cpp"), source.join("\n")).expect("write refresh.cpp");
    let dir = tmp.path().to_string_lossy().to_string();

    let mut b = ProgramBuilder::new();
    let void = b.void();
    let qi = b.function(
        "_ZN13nsCOMPtr_base25assign_from_qi_with_errorERK25nsQueryInterfaceWithErrorRK4nsID",
        void,
        vec![],
    );
    let refresh = b.function("Refresh", void, vec![]);
    let entry = b.block(refresh, "entry");
    let body = b.block(refresh, "while.body");
    let exit = b.block(refresh, "while.end");
    let flag = b.const_int(1, 1);

    b.at(&dir, "refresh.cpp", 2);
    b.br(entry, body);
    b.at(&dir, "refresh.cpp", 4);
    b.call(body, qi, vec![]);
    b.at(&dir, "refresh.cpp", 5);
    b.cond_br(body, flag, body, exit);
    b.at(&dir, "refresh.cpp", 8);
    b.ret(exit, None);
    b.add_loop(refresh, body, vec![body], 1, None);
    let (program, loops) = b.finish().expect("valid program");

    let findings = scan(Detector::MozillaBug409961, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(findings.len(), 1);
    let finding = &findings[0];
    assert_eq!(finding.primary().map(|s| s.location.line), Some(4));
    assert_eq!(finding.context[0], FindingContext::LoopDepth { depth: 1 });
    assert_eq!(finding.context[1], FindingContext::LoopHeader { is_header: true });

    // Lines 2..=8 padded by five on each side, clamped to the file.
    match &finding.context[2] {
        FindingContext::Excerpt { first_line, lines, .. } => {
            assert_eq!(*first_line, 1);
            assert_eq!(lines.len(), source.len());
            assert_eq!(lines[3], source[3]);
        }
        other => panic!("expected an excerpt, got {other:?}"),
    }
}
