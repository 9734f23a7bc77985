//! Ahead-of-time branch resolution from known operand literals.

use stacksim::decode::{Insn, Label, MethodCode};
use stacksim::sim::{Prediction, Simulator};

fn simulator(descriptor: &str, insns: Vec<Insn>) -> Simulator {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut method = MethodCode::new(descriptor, true).with_limits(8, 8);
    for insn in insns {
        method.emit(insn);
    }
    let mut sim = Simulator::new(method).unwrap();
    sim.init_locals().unwrap();
    sim
}

fn step(sim: &mut Simulator) {
    sim.perform_pops().unwrap();
    sim.perform_pushes().unwrap();
    sim.perform_jump(None).unwrap();
}

/// Run to the instruction at `pc`, then ask for its predicted target.
fn prediction_at(sim: &mut Simulator, pc: usize) -> Prediction {
    while sim.pc() < pc {
        step(sim);
    }
    sim.expected_jump_target().unwrap()
}

#[test]
fn equal_known_operands_take_the_branch() {
    let mut sim = simulator(
        "()V",
        vec![
            Insn::Iconst4,
            Insn::Bipush(4),
            Insn::IfIcmpeq(Label(0)),
            Insn::Return,
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    assert_eq!(prediction_at(&mut sim, 2), Prediction::Target(Label(0)));
}

#[test]
fn unequal_known_operands_fall_through() {
    let mut sim = simulator(
        "()V",
        vec![
            Insn::Iconst4,
            Insn::Bipush(5),
            Insn::IfIcmpeq(Label(0)),
            Insn::Return,
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    assert_eq!(prediction_at(&mut sim, 2), Prediction::FallThrough);
}

#[test]
fn unknown_operand_is_undetermined() {
    let mut sim = simulator(
        "(I)V",
        vec![
            Insn::Iload(0),
            Insn::Ifeq(Label(0)),
            Insn::Return,
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Undetermined);
}

#[test]
fn prediction_agrees_before_and_after_the_pop_phase() {
    let mut sim = simulator(
        "()V",
        vec![
            Insn::IconstM1,
            Insn::Iflt(Label(0)),
            Insn::Return,
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    step(&mut sim);
    // Pop state: operands peeked from the stack.
    assert_eq!(sim.expected_jump_target().unwrap(), Prediction::Target(Label(0)));
    sim.perform_pops().unwrap();
    // Push state: operands read from the retained pop buffer.
    assert_eq!(sim.expected_jump_target().unwrap(), Prediction::Target(Label(0)));
}

#[test]
fn unconditional_jumps_always_resolve() {
    let mut sim = simulator(
        "()V",
        vec![Insn::Goto(Label(0)), Insn::Label(Label(0)), Insn::Return],
    );
    assert_eq!(sim.expected_jump_target().unwrap(), Prediction::Target(Label(0)));
    assert_eq!(sim.jump_candidates().unwrap(), vec![Label(0)]);
}

#[test]
fn table_switch_resolves_in_range_keys_to_their_case() {
    let switch = |key: Insn| {
        vec![
            key,
            Insn::Tableswitch {
                min: 10,
                max: 12,
                default: Label(9),
                targets: vec![Label(0), Label(1), Label(2)],
            },
            Insn::Label(Label(0)),
            Insn::Label(Label(1)),
            Insn::Label(Label(2)),
            Insn::Label(Label(9)),
            Insn::Return,
        ]
    };
    let mut sim = simulator("()V", switch(Insn::Bipush(11)));
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Target(Label(1)));

    // Out of range falls back to the default target.
    let mut sim = simulator("()V", switch(Insn::Bipush(42)));
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Target(Label(9)));
}

#[test]
fn lookup_switch_matches_keys_or_defaults() {
    let switch = |key: Insn| {
        vec![
            key,
            Insn::Lookupswitch {
                default: Label(9),
                pairs: vec![(100, Label(0)), (-7, Label(1))],
            },
            Insn::Label(Label(0)),
            Insn::Label(Label(1)),
            Insn::Label(Label(9)),
            Insn::Return,
        ]
    };
    let mut sim = simulator("()V", switch(Insn::Bipush(-7)));
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Target(Label(1)));

    let mut sim = simulator("()V", switch(Insn::Iconst0));
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Target(Label(9)));
}

#[test]
fn only_null_literals_fold_reference_branches() {
    let mut sim = simulator(
        "()V",
        vec![
            Insn::AconstNull,
            Insn::Ifnull(Label(0)),
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Target(Label(0)));

    // A reference without a null literal is never resolved.
    let mut sim = simulator(
        "(Ljava/lang/Object;)V",
        vec![
            Insn::Aload(0),
            Insn::Ifnonnull(Label(0)),
            Insn::Label(Label(0)),
            Insn::Return,
        ],
    );
    assert_eq!(prediction_at(&mut sim, 1), Prediction::Undetermined);
}

#[test]
fn subroutine_return_resolves_to_the_label_after_its_jsr() {
    let mut sim = simulator(
        "()V",
        vec![
            Insn::Jsr(Label(5)),        // 0
            Insn::Label(Label(1)),      // 1: continuation
            Insn::Return,               // 2
            Insn::Nop,                  // 3
            Insn::Nop,                  // 4
            Insn::Label(Label(5)),      // 5: subroutine body
            Insn::Astore(1),            // 6
            Insn::Ret(1),               // 7
        ],
    );
    sim.perform_pops().unwrap();
    sim.perform_pushes().unwrap();
    sim.perform_jump(Some(Label(5))).unwrap();
    step(&mut sim); // label
    step(&mut sim); // astore_1
    assert_eq!(sim.pc(), 7);
    assert_eq!(sim.jump_candidates().unwrap(), vec![Label(1)]);
    assert_eq!(sim.expected_jump_target().unwrap(), Prediction::Target(Label(1)));
    sim.perform_pops().unwrap();
    sim.perform_pushes().unwrap();
    sim.perform_jump(Some(Label(1))).unwrap();
    assert_eq!(sim.pc(), 1);
}
