//! Static stack-effect table checks: per-opcode pop/push widths and jump
//! target ordering.

use stacksim::decode::{Const, FieldOp, Insn, InvokeKind, Label, MethodCode, PrimArray};
use stacksim::effect::{EffectTable, PopReq};
use stacksim::value::Category;

fn table_for(insns: Vec<Insn>) -> EffectTable {
    let mut method = MethodCode::new("()V", true).with_limits(8, 8);
    for insn in insns {
        method.emit(insn);
    }
    EffectTable::build(&method).unwrap()
}

fn single(insn: Insn) -> stacksim::effect::EffectEntry {
    table_for(vec![insn]).entry(0).clone()
}

#[test]
fn stack_delta_matches_the_machine_specification() {
    // (mnemonic under test, expected pop width, expected push width)
    let cases: Vec<(Insn, usize, usize)> = vec![
        (Insn::Nop, 0, 0),
        (Insn::Iconst2, 0, 1),
        (Insn::Lconst0, 0, 2),
        (Insn::Dconst1, 0, 2),
        (Insn::Iload(0), 0, 1),
        (Insn::Dload(0), 0, 2),
        (Insn::Lstore(0), 2, 0),
        (Insn::Iaload, 2, 1),
        (Insn::Laload, 2, 2),
        (Insn::Dastore, 4, 0),
        (Insn::Iadd, 2, 1),
        (Insn::Ladd, 4, 2),
        (Insn::Lshl, 3, 2),
        (Insn::Lcmp, 4, 1),
        (Insn::Dcmpg, 4, 1),
        (Insn::I2d, 1, 2),
        (Insn::D2i, 2, 1),
        (Insn::Arraylength, 1, 1),
        (Insn::Monitorenter, 1, 0),
        (Insn::Ifeq(Label(0)), 1, 0),
        (Insn::IfIcmplt(Label(0)), 2, 0),
        (Insn::Jsr(Label(0)), 0, 1),
    ];
    for (insn, pops, pushes) in cases {
        let entry = single(insn.clone());
        assert_eq!(entry.pop_width(), pops, "pop width of {insn}");
        assert_eq!(entry.push_width(), pushes, "push width of {insn}");
    }
}

#[test]
fn shuffles_declare_pop_widths_but_no_pushes() {
    let entry = single(Insn::Dup2X1);
    assert!(entry.is_shuffle);
    assert_eq!(entry.pops, vec![PopReq::Any2, PopReq::Any1]);
    assert!(entry.pushes.is_empty());

    let entry = single(Insn::Pop2);
    assert!(!entry.is_shuffle);
    assert_eq!(entry.pops, vec![PopReq::Any2]);
}

#[test]
fn invoke_pops_arguments_reversed_then_receiver() {
    let entry = single(Insn::Invoke {
        kind: InvokeKind::Virtual,
        owner: "Widget".into(),
        name: "resize".into(),
        descriptor: "(IJ)Z".into(),
    });
    // Stack top holds the long (pushed last), the receiver is deepest.
    assert_eq!(
        entry.pops,
        vec![
            PopReq::Cat(Category::Long),
            PopReq::Cat(Category::Int),
            PopReq::Cat(Category::Reference),
        ]
    );
    assert_eq!(entry.pushes, vec![Category::Int]);

    let entry = single(Insn::Invoke {
        kind: InvokeKind::Static,
        owner: "Math".into(),
        name: "sqrt".into(),
        descriptor: "(D)D".into(),
    });
    assert_eq!(entry.pops, vec![PopReq::Cat(Category::Double)]);
    assert_eq!(entry.pushes, vec![Category::Double]);
}

#[test]
fn field_access_shapes_follow_the_descriptor() {
    let field = |op| Insn::Field {
        op,
        owner: "Widget".into(),
        name: "weight".into(),
        descriptor: "J".into(),
    };
    let entry = single(field(FieldOp::GetStatic));
    assert_eq!(entry.pushes, vec![Category::Long]);
    assert!(entry.pops.is_empty());

    // putfield pops the value, then the receiver beneath it.
    let entry = single(field(FieldOp::PutField));
    assert_eq!(
        entry.pops,
        vec![PopReq::Cat(Category::Long), PopReq::Cat(Category::Reference)]
    );
    assert!(entry.pushes.is_empty());
}

#[test]
fn switch_targets_list_default_first_then_cases_in_order() {
    let entry = single(Insn::Tableswitch {
        min: 1,
        max: 3,
        default: Label(9),
        targets: vec![Label(1), Label(2), Label(3)],
    });
    assert_eq!(entry.jump_targets, vec![Label(9), Label(1), Label(2), Label(3)]);

    let entry = single(Insn::Lookupswitch {
        default: Label(9),
        pairs: vec![(10, Label(4)), (40, Label(5))],
    });
    assert_eq!(entry.jump_targets, vec![Label(9), Label(4), Label(5)]);
}

#[test]
fn returns_and_throw_clear_the_stack() {
    for insn in [Insn::Return, Insn::Ireturn, Insn::Dreturn] {
        let entry = single(insn);
        assert!(entry.is_return);
        assert!(entry.clears_stack);
    }
    let entry = single(Insn::Athrow);
    assert!(entry.is_throw);
    assert!(entry.clears_stack);
    assert_eq!(entry.pops, vec![PopReq::Cat(Category::Reference)]);
}

#[test]
fn constant_loads_push_their_declared_category() {
    assert_eq!(single(Insn::Ldc(Const::Long(1))).pushes, vec![Category::Long]);
    assert_eq!(
        single(Insn::Ldc(Const::Str("hi".into()))).pushes,
        vec![Category::Reference]
    );
    assert_eq!(
        single(Insn::Ldc(Const::Dynamic { descriptor: "D".into() })).pushes,
        vec![Category::Double]
    );
    assert_eq!(single(Insn::Newarray(PrimArray::Int)).pushes, vec![Category::Reference]);
}

#[test]
fn malformed_descriptors_fail_table_construction() {
    let mut method = MethodCode::new("()V", true);
    method.emit(Insn::Invoke {
        kind: InvokeKind::Static,
        owner: "Widget".into(),
        name: "bad".into(),
        descriptor: "(Q)V".into(),
    });
    assert!(EffectTable::build(&method).is_err());
}
