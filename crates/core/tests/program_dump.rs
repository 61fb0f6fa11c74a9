use perfscan_core::ir::{
    BlockId, InstId, InstKind, IrError, Program, ProgramBuilder, ProgramDump, ValueRef,
};
use perfscan_core::loops::LoopProvider;

fn counted_loop() -> ProgramDump {
    let mut b = ProgramBuilder::new();
    let void = b.void();
    let i32_ty = b.int(32);
    let f = b.function("count", void, vec![]);
    let entry = b.block(f, "entry");
    let head = b.block(f, "head");
    let exit = b.block(f, "exit");
    let flag = b.const_int(1, 1);
    b.at("/src", "count.c", 2);
    let slot = b.alloca(entry, i32_ty);
    b.br(entry, head);
    b.at("/src", "count.c", 3);
    b.load(head, slot);
    b.cond_br(head, flag, head, exit);
    b.at("/src", "count.c", 4);
    b.ret(exit, None);
    b.add_loop(f, head, vec![head], 1, None);
    b.into_dump()
}

#[test]
fn json_dump_assembles_with_its_loops() {
    let json = serde_json::to_string(&counted_loop()).expect("serialize dump");
    let dump: ProgramDump = serde_json::from_str(&json).expect("parse dump");
    let (program, loops) = Program::from_dump(dump).expect("valid dump");

    let count = program.function_by_name("count").expect("count exists");
    assert_eq!(program.function(count).blocks.len(), 3);
    let forest = loops.loops_for(count);
    let head = program.function(count).blocks[1];
    assert!(forest.is_loop_header(head));
    assert_eq!(forest.loop_depth(head), 1);
    assert_eq!(forest.loop_depth(program.function(count).blocks[2]), 0);

    // Serializing the assembled program again gives the same arenas.
    let again = program.to_dump(Vec::new());
    let original: ProgramDump = serde_json::from_str(&json).expect("parse dump");
    assert_eq!(again.insts, original.insts);
    assert_eq!(again.types, original.types);
}

#[test]
fn empty_dump_is_an_empty_program() {
    let dump: ProgramDump = serde_json::from_str("{}").expect("parse empty dump");
    let (program, loops) = Program::from_dump(dump).expect("empty dump is valid");
    assert_eq!(program.functions().count(), 0);
    assert!(loops.is_empty());
}

#[test]
fn dangling_operand_is_rejected() {
    let mut dump = counted_loop();
    let load = dump
        .insts
        .iter()
        .position(|i| matches!(i.kind, InstKind::Load { .. }))
        .expect("load present");
    dump.insts[load].kind = InstKind::Load { ptr: ValueRef::Inst(InstId(999)) };

    let err = Program::from_dump(dump).expect_err("dangling operand");
    assert_eq!(
        err,
        IrError::DanglingReference { what: "instruction", index: 999, from: format!("%i{load}") }
    );
    assert_eq!(err.to_string(), format!("instruction 999 referenced from %i{load} does not exist"));
}

#[test]
fn loop_over_a_missing_block_is_rejected() {
    let mut dump = counted_loop();
    dump.loops[0].forest.loops[0].blocks.push(BlockId(77));

    match Program::from_dump(dump) {
        Err(IrError::DanglingReference { what, index, .. }) => {
            assert_eq!(what, "block");
            assert_eq!(index, 77);
        }
        Err(other) => panic!("expected a dangling block, got {other}"),
        Ok(_) => panic!("loop over a missing block should be rejected"),
    }
}

#[test]
fn instruction_in_two_blocks_is_rejected() {
    let mut dump = counted_loop();
    let shared = dump.blocks[0].insts[0];
    dump.blocks[2].insts.insert(0, shared);

    let err = Program::from_dump(dump).expect_err("shared instruction");
    assert_eq!(err, IrError::SharedInstruction(shared));
}
