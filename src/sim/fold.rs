//! Known-value propagation
//!
//! Computes the literal annotation of a pushed value from the instruction
//! and the literals of its popped operands, using the machine's fixed-width
//! numeric semantics: 32/64-bit wraparound, shift-distance masking,
//! truncating division, IEEE single/double arithmetic, and narrowing-cast
//! truncation. When exactly one side of a binary operator is known the
//! result is a partial display string such as `Unknown+3`; when neither is,
//! no annotation is produced.
//!
//! Allocation opcodes annotate the produced reference with a synthetic
//! `Type: <descriptor> Length: <n,..>` shape carrying one length per
//! dimension; `arraylength` answers the first dimension and `aaload`
//! narrows the type and keeps the remaining lengths. `new` and
//! object-returning invocations annotate the reference with its type
//! alone.

use crate::decode::{descriptor, Const, Insn};
use crate::value::Value;

/// Literal pushed directly by a constant-load instruction.
pub fn const_known(insn: &Insn) -> Option<String> {
    let s = match insn {
        Insn::AconstNull => "null".to_owned(),
        Insn::IconstM1 => "-1".to_owned(),
        Insn::Iconst0 => "0".to_owned(),
        Insn::Iconst1 => "1".to_owned(),
        Insn::Iconst2 => "2".to_owned(),
        Insn::Iconst3 => "3".to_owned(),
        Insn::Iconst4 => "4".to_owned(),
        Insn::Iconst5 => "5".to_owned(),
        Insn::Lconst0 => "0".to_owned(),
        Insn::Lconst1 => "1".to_owned(),
        Insn::Fconst0 => "0.0".to_owned(),
        Insn::Fconst1 => "1.0".to_owned(),
        Insn::Fconst2 => "2.0".to_owned(),
        Insn::Dconst0 => "0.0".to_owned(),
        Insn::Dconst1 => "1.0".to_owned(),
        Insn::Bipush(v) => v.to_string(),
        Insn::Sipush(v) => v.to_string(),
        Insn::Ldc(c) => match c {
            Const::Int(v) => v.to_string(),
            Const::Float(v) => format!("{v:?}"),
            Const::Long(v) => v.to_string(),
            Const::Double(v) => format!("{v:?}"),
            Const::Str(s) => s.clone(),
            Const::Class(name) => format!("class {name}"),
            Const::MethodType(_) | Const::MethodHandle(_) | Const::Dynamic { .. } => return None,
        },
        _ => return None,
    };
    Some(s)
}

/// Literal of the value pushed by `insn`, given the operands it popped
/// (topmost first). `None` when nothing is statically derivable.
pub fn folded_known(insn: &Insn, popped: &[Value]) -> Option<String> {
    match insn {
        // Integer arithmetic and bitwise, 32-bit wraparound.
        Insn::Iadd => bin_i32(popped, "+", |a, b| Some(a.wrapping_add(b))),
        Insn::Isub => bin_i32(popped, "-", |a, b| Some(a.wrapping_sub(b))),
        Insn::Imul => bin_i32(popped, "*", |a, b| Some(a.wrapping_mul(b))),
        Insn::Idiv => bin_i32(popped, "/", |a, b| a.checked_div(b)),
        Insn::Irem => bin_i32(popped, "%", |a, b| a.checked_rem(b)),
        Insn::Ishl => bin_i32(popped, "<<", |a, b| Some(a.wrapping_shl(b as u32 & 31))),
        Insn::Ishr => bin_i32(popped, ">>", |a, b| Some(a.wrapping_shr(b as u32 & 31))),
        Insn::Iushr => {
            bin_i32(popped, ">>>", |a, b| Some(((a as u32) >> (b as u32 & 31)) as i32))
        }
        Insn::Iand => bin_i32(popped, "&", |a, b| Some(a & b)),
        Insn::Ior => bin_i32(popped, "|", |a, b| Some(a | b)),
        Insn::Ixor => bin_i32(popped, "^", |a, b| Some(a ^ b)),
        Insn::Ineg => parse::<i32>(&popped[0]).map(|v| v.wrapping_neg().to_string()),

        // Long arithmetic, 64-bit wraparound; shifts take an int distance.
        Insn::Ladd => bin_i64(popped, "+", |a, b| Some(a.wrapping_add(b))),
        Insn::Lsub => bin_i64(popped, "-", |a, b| Some(a.wrapping_sub(b))),
        Insn::Lmul => bin_i64(popped, "*", |a, b| Some(a.wrapping_mul(b))),
        Insn::Ldiv => bin_i64(popped, "/", |a, b| a.checked_div(b)),
        Insn::Lrem => bin_i64(popped, "%", |a, b| a.checked_rem(b)),
        Insn::Lshl => long_shift(popped, "<<", |a, b| a.wrapping_shl(b as u32 & 63)),
        Insn::Lshr => long_shift(popped, ">>", |a, b| a.wrapping_shr(b as u32 & 63)),
        Insn::Lushr => {
            long_shift(popped, ">>>", |a, b| ((a as u64) >> (b as u64 & 63)) as i64)
        }
        Insn::Land => bin_i64(popped, "&", |a, b| Some(a & b)),
        Insn::Lor => bin_i64(popped, "|", |a, b| Some(a | b)),
        Insn::Lxor => bin_i64(popped, "^", |a, b| Some(a ^ b)),
        Insn::Lneg => parse::<i64>(&popped[0]).map(|v| v.wrapping_neg().to_string()),

        // IEEE single/double arithmetic.
        Insn::Fadd => bin_f32(popped, "+", |a, b| a + b),
        Insn::Fsub => bin_f32(popped, "-", |a, b| a - b),
        Insn::Fmul => bin_f32(popped, "*", |a, b| a * b),
        Insn::Fdiv => bin_f32(popped, "/", |a, b| a / b),
        Insn::Frem => bin_f32(popped, "%", |a, b| a % b),
        Insn::Fneg => parse::<f32>(&popped[0]).map(|v| format!("{:?}", -v)),
        Insn::Dadd => bin_f64(popped, "+", |a, b| a + b),
        Insn::Dsub => bin_f64(popped, "-", |a, b| a - b),
        Insn::Dmul => bin_f64(popped, "*", |a, b| a * b),
        Insn::Ddiv => bin_f64(popped, "/", |a, b| a / b),
        Insn::Drem => bin_f64(popped, "%", |a, b| a % b),
        Insn::Dneg => parse::<f64>(&popped[0]).map(|v| format!("{:?}", -v)),

        // Conversions; float-to-int saturates and maps NaN to zero, which is
        // exactly what `as` does.
        Insn::I2l => parse::<i32>(&popped[0]).map(|v| (v as i64).to_string()),
        Insn::I2f => parse::<i32>(&popped[0]).map(|v| format!("{:?}", v as f32)),
        Insn::I2d => parse::<i32>(&popped[0]).map(|v| format!("{:?}", v as f64)),
        Insn::L2i => parse::<i64>(&popped[0]).map(|v| (v as i32).to_string()),
        Insn::L2f => parse::<i64>(&popped[0]).map(|v| format!("{:?}", v as f32)),
        Insn::L2d => parse::<i64>(&popped[0]).map(|v| format!("{:?}", v as f64)),
        Insn::F2i => parse::<f32>(&popped[0]).map(|v| (v as i32).to_string()),
        Insn::F2l => parse::<f32>(&popped[0]).map(|v| (v as i64).to_string()),
        Insn::F2d => parse::<f32>(&popped[0]).map(|v| format!("{:?}", v as f64)),
        Insn::D2i => parse::<f64>(&popped[0]).map(|v| (v as i32).to_string()),
        Insn::D2l => parse::<f64>(&popped[0]).map(|v| (v as i64).to_string()),
        Insn::D2f => parse::<f64>(&popped[0]).map(|v| format!("{:?}", v as f32)),
        Insn::I2b => parse::<i32>(&popped[0]).map(|v| (v as i8 as i32).to_string()),
        Insn::I2c => parse::<i32>(&popped[0]).map(|v| (v as u16 as i32).to_string()),
        Insn::I2s => parse::<i32>(&popped[0]).map(|v| (v as i16 as i32).to_string()),

        // Comparisons fold only when both operands are known.
        Insn::Lcmp => {
            let (a, b) = (parse::<i64>(&popped[1])?, parse::<i64>(&popped[0])?);
            Some(cmp_sign(a.cmp(&b)))
        }
        Insn::Fcmpl | Insn::Fcmpg => {
            let (a, b) = (parse::<f32>(&popped[1])?, parse::<f32>(&popped[0])?);
            Some(float_cmp(a.partial_cmp(&b), matches!(insn, Insn::Fcmpg)))
        }
        Insn::Dcmpl | Insn::Dcmpg => {
            let (a, b) = (parse::<f64>(&popped[1])?, parse::<f64>(&popped[0])?);
            Some(float_cmp(a.partial_cmp(&b), matches!(insn, Insn::Dcmpg)))
        }

        // Array allocation shape annotations.
        Insn::Newarray(kind) => Some(annotation(kind.descriptor(), popped.first())),
        Insn::Anewarray(owner) => {
            let desc = format!("[L{owner};");
            Some(annotation(&desc, popped.first()))
        }
        Insn::Multianewarray { descriptor, dims } => {
            // Lengths are pushed outermost dimension first, so the first
            // dimension is deepest in the popped buffer. An unknown
            // dimension keeps its slot empty so the later ones still line
            // up when `aaload` strips the first.
            let n = *dims as usize;
            let lengths = (0..n)
                .map(|i| {
                    popped
                        .get(n - 1 - i)
                        .and_then(|v| v.known.as_deref())
                        .filter(|k| k.parse::<i32>().is_ok())
                        .unwrap_or("")
                })
                .collect::<Vec<_>>()
                .join(",");
            Some(format!("Type: {descriptor} Length: {lengths}"))
        }
        Insn::Arraylength => annotation_length(popped[0].known.as_deref()?).map(str::to_owned),
        Insn::Aaload => {
            let known = popped[1].known.as_deref()?;
            let inner = annotation_type(known)?.strip_prefix('[')?;
            match annotation_lengths(known).and_then(|l| l.split_once(',')) {
                Some((_, rest)) => Some(format!("Type: {inner} Length: {rest}")),
                None => Some(format!("Type: {inner}")),
            }
        }

        // Object allocations and object-returning calls carry their type.
        Insn::New(owner) => Some(format!("Type: {owner}")),
        Insn::Invoke { descriptor: d, .. } | Insn::Invokedynamic { descriptor: d, .. } => {
            let ret = descriptor::return_descriptor(d)?;
            ret.starts_with('L').then(|| format!("Type: {ret}"))
        }

        // A cast leaves the value's literal untouched; `instanceof` only
        // folds the null case.
        Insn::Checkcast(_) => popped[0].known.clone(),
        Insn::Instanceof(_) => (popped[0].known.as_deref()? == "null").then(|| "0".to_owned()),

        _ => None,
    }
}

/// Literal after incrementing a local's literal by `delta` (`iinc`).
pub fn incremented_known(known: Option<&str>, delta: i16) -> Option<String> {
    let known = known?;
    match known.parse::<i32>() {
        Ok(v) => Some(v.wrapping_add(delta as i32).to_string()),
        Err(_) => Some(format!("{known}+{delta}")),
    }
}

/// Element-type descriptor recorded in an allocation annotation.
pub fn annotation_type(known: &str) -> Option<&str> {
    let rest = known.strip_prefix("Type: ")?;
    Some(rest.split(' ').next().unwrap_or(rest))
}

/// Known first-dimension length recorded in an allocation annotation.
pub fn annotation_length(known: &str) -> Option<&str> {
    let first = annotation_lengths(known)?.split(',').next()?;
    (!first.is_empty()).then_some(first)
}

/// The full comma-separated length list of an allocation annotation.
fn annotation_lengths(known: &str) -> Option<&str> {
    known.split(" Length: ").nth(1)
}

fn annotation(descriptor: &str, length: Option<&Value>) -> String {
    match length.and_then(parse::<i32>) {
        Some(n) => format!("Type: {descriptor} Length: {n}"),
        None => format!("Type: {descriptor}"),
    }
}

fn parse<T: std::str::FromStr>(value: &Value) -> Option<T> {
    value.known.as_deref()?.parse().ok()
}

/// Partial rendering with the left operand first: `Unknown+3`, `4-Unknown`.
fn partial(left: Option<&str>, op: &str, right: Option<&str>) -> Option<String> {
    if left.is_none() && right.is_none() {
        return None;
    }
    Some(format!(
        "{}{}{}",
        left.unwrap_or("Unknown"),
        op,
        right.unwrap_or("Unknown")
    ))
}

fn bin_i32(popped: &[Value], op: &str, f: impl Fn(i32, i32) -> Option<i32>) -> Option<String> {
    let (left, right) = (&popped[1], &popped[0]);
    match (parse::<i32>(left), parse::<i32>(right)) {
        (Some(a), Some(b)) => f(a, b).map(|v| v.to_string()),
        _ => partial(left.known.as_deref(), op, right.known.as_deref()),
    }
}

fn bin_i64(popped: &[Value], op: &str, f: impl Fn(i64, i64) -> Option<i64>) -> Option<String> {
    let (left, right) = (&popped[1], &popped[0]);
    match (parse::<i64>(left), parse::<i64>(right)) {
        (Some(a), Some(b)) => f(a, b).map(|v| v.to_string()),
        _ => partial(left.known.as_deref(), op, right.known.as_deref()),
    }
}

/// Long shifts pop an int distance on top of a long value.
fn long_shift(popped: &[Value], op: &str, f: impl Fn(i64, i32) -> i64) -> Option<String> {
    let (left, right) = (&popped[1], &popped[0]);
    match (parse::<i64>(left), parse::<i32>(right)) {
        (Some(a), Some(b)) => Some(f(a, b).to_string()),
        _ => partial(left.known.as_deref(), op, right.known.as_deref()),
    }
}

fn bin_f32(popped: &[Value], op: &str, f: impl Fn(f32, f32) -> f32) -> Option<String> {
    let (left, right) = (&popped[1], &popped[0]);
    match (parse::<f32>(left), parse::<f32>(right)) {
        (Some(a), Some(b)) => Some(format!("{:?}", f(a, b))),
        _ => partial(left.known.as_deref(), op, right.known.as_deref()),
    }
}

fn bin_f64(popped: &[Value], op: &str, f: impl Fn(f64, f64) -> f64) -> Option<String> {
    let (left, right) = (&popped[1], &popped[0]);
    match (parse::<f64>(left), parse::<f64>(right)) {
        (Some(a), Some(b)) => Some(format!("{:?}", f(a, b))),
        _ => partial(left.known.as_deref(), op, right.known.as_deref()),
    }
}

fn cmp_sign(ord: std::cmp::Ordering) -> String {
    match ord {
        std::cmp::Ordering::Less => "-1".to_owned(),
        std::cmp::Ordering::Equal => "0".to_owned(),
        std::cmp::Ordering::Greater => "1".to_owned(),
    }
}

/// NaN compares as -1 for the `l` variants and 1 for the `g` variants.
fn float_cmp(ord: Option<std::cmp::Ordering>, greater_on_nan: bool) -> String {
    match ord {
        Some(ord) => cmp_sign(ord),
        None if greater_on_nan => "1".to_owned(),
        None => "-1".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Category, LineageStore, Value};

    fn int(store: &LineageStore, known: Option<&str>) -> Value {
        let v = Value::new(Category::Int, store.origin(0));
        match known {
            Some(k) => v.with_known(k),
            None => v,
        }
    }

    #[test]
    fn fully_known_int_arithmetic_folds() {
        let store = LineageStore::new();
        // popped is topmost first: 3 on top of 2.
        let popped = [int(&store, Some("3")), int(&store, Some("2"))];
        assert_eq!(folded_known(&Insn::Iadd, &popped), Some("5".to_owned()));
        assert_eq!(folded_known(&Insn::Isub, &popped), Some("-1".to_owned()));
        assert_eq!(folded_known(&Insn::Ishl, &popped), Some("16".to_owned()));
    }

    #[test]
    fn partial_known_renders_left_first() {
        let store = LineageStore::new();
        let popped = [int(&store, Some("3")), int(&store, None)];
        assert_eq!(folded_known(&Insn::Iadd, &popped), Some("Unknown+3".to_owned()));
        let popped = [int(&store, None), int(&store, Some("4"))];
        assert_eq!(folded_known(&Insn::Isub, &popped), Some("4-Unknown".to_owned()));
        let popped = [int(&store, None), int(&store, None)];
        assert_eq!(folded_known(&Insn::Iadd, &popped), None);
    }

    #[test]
    fn division_by_known_zero_yields_nothing() {
        let store = LineageStore::new();
        let popped = [int(&store, Some("0")), int(&store, Some("8"))];
        assert_eq!(folded_known(&Insn::Idiv, &popped), None);
        assert_eq!(folded_known(&Insn::Irem, &popped), None);
    }

    #[test]
    fn wraparound_and_masking_follow_machine_semantics() {
        let store = LineageStore::new();
        let popped = [int(&store, Some("1")), int(&store, Some(&i32::MAX.to_string()))];
        assert_eq!(folded_known(&Insn::Iadd, &popped), Some(i32::MIN.to_string()));
        // Shift distance 33 masks to 1.
        let popped = [int(&store, Some("33")), int(&store, Some("1"))];
        assert_eq!(folded_known(&Insn::Ishl, &popped), Some("2".to_owned()));
    }

    #[test]
    fn narrowing_casts_truncate() {
        let store = LineageStore::new();
        let popped = [int(&store, Some("300"))];
        assert_eq!(folded_known(&Insn::I2b, &popped), Some("44".to_owned()));
        let popped = [int(&store, Some("-1"))];
        assert_eq!(folded_known(&Insn::I2c, &popped), Some("65535".to_owned()));
    }

    #[test]
    fn array_annotation_narrows_and_answers_length() {
        let store = LineageStore::new();
        let arr = Value::new(Category::Reference, store.origin(0))
            .with_known("Type: [[I Length: 3");
        assert_eq!(
            folded_known(&Insn::Arraylength, std::slice::from_ref(&arr)),
            Some("3".to_owned())
        );
        let idx = int(&store, None);
        let popped = [idx, arr];
        assert_eq!(folded_known(&Insn::Aaload, &popped), Some("Type: [I".to_owned()));
    }

    #[test]
    fn multi_dim_annotation_keeps_every_length() {
        let store = LineageStore::new();
        // Lengths are popped innermost first: 4 on top of 3.
        let popped = [int(&store, Some("4")), int(&store, Some("3"))];
        let insn = Insn::Multianewarray { descriptor: "[[I".to_owned(), dims: 2 };
        assert_eq!(
            folded_known(&insn, &popped),
            Some("Type: [[I Length: 3,4".to_owned())
        );
        // An unknown dimension keeps its slot so the known one lines up.
        let popped = [int(&store, Some("4")), int(&store, None)];
        assert_eq!(
            folded_known(&insn, &popped),
            Some("Type: [[I Length: ,4".to_owned())
        );
    }

    #[test]
    fn element_load_keeps_the_inner_lengths() {
        let store = LineageStore::new();
        let arr = Value::new(Category::Reference, store.origin(0))
            .with_known("Type: [[I Length: 3,4");
        assert_eq!(annotation_length("Type: [[I Length: 3,4"), Some("3"));
        let popped = [int(&store, None), arr];
        let inner = folded_known(&Insn::Aaload, &popped);
        assert_eq!(inner, Some("Type: [I Length: 4".to_owned()));
        let inner = Value::new(Category::Reference, store.origin(1))
            .with_known(inner.as_deref().unwrap_or(""));
        assert_eq!(
            folded_known(&Insn::Arraylength, std::slice::from_ref(&inner)),
            Some("4".to_owned())
        );
    }

    #[test]
    fn unknown_first_dimension_answers_no_length() {
        assert_eq!(annotation_length("Type: [[I Length: ,4"), None);
        assert_eq!(annotation_length("Type: [I"), None);
    }

    #[test]
    fn object_allocations_and_calls_carry_their_type() {
        let store = LineageStore::new();
        assert_eq!(
            folded_known(&Insn::New("java/lang/StringBuilder".to_owned()), &[]),
            Some("Type: java/lang/StringBuilder".to_owned())
        );
        let call = Insn::Invoke {
            kind: crate::decode::InvokeKind::Static,
            owner: "java/lang/String".to_owned(),
            name: "valueOf".to_owned(),
            descriptor: "(I)Ljava/lang/String;".to_owned(),
        };
        let popped = [int(&store, None)];
        assert_eq!(
            folded_known(&call, &popped),
            Some("Type: Ljava/lang/String;".to_owned())
        );
        // Primitive and array returns stay unannotated.
        let call = Insn::Invokedynamic {
            name: "makeConcat".to_owned(),
            descriptor: "()[I".to_owned(),
        };
        assert_eq!(folded_known(&call, &[]), None);
    }

    #[test]
    fn iinc_folds_or_renders_partially() {
        assert_eq!(incremented_known(Some("4"), 2), Some("6".to_owned()));
        assert_eq!(incremented_known(Some("Unknown+3"), 2), Some("Unknown+3+2".to_owned()));
        assert_eq!(incremented_known(None, 2), None);
    }
}
