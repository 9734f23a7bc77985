//! JVM field and method descriptor parsing
//!
//! Maps descriptor strings onto operand stack categories. Byte, boolean,
//! char and short all land on the int category, arrays and objects on
//! reference, matching the machine's computational types.

use crate::error::{Error, Result};
use crate::value::Category;

fn bad(descriptor: &str) -> Error {
    Error::BadDescriptor { descriptor: descriptor.to_string() }
}

/// Consume one field type from `chars`, returning its category.
fn consume_field(chars: &mut std::str::Chars<'_>, whole: &str) -> Result<Category> {
    match chars.next() {
        Some('B') | Some('C') | Some('I') | Some('S') | Some('Z') => Ok(Category::Int),
        Some('J') => Ok(Category::Long),
        Some('F') => Ok(Category::Float),
        Some('D') => Ok(Category::Double),
        Some('L') => {
            for c in chars.by_ref() {
                if c == ';' {
                    return Ok(Category::Reference);
                }
            }
            Err(bad(whole))
        }
        Some('[') => {
            // Skip the element type; the array itself is one reference.
            consume_field(chars, whole)?;
            Ok(Category::Reference)
        }
        _ => Err(bad(whole)),
    }
}

/// Category of a single field descriptor such as `I`, `[J` or `Ljava/lang/String;`.
pub fn field_category(descriptor: &str) -> Result<Category> {
    let mut chars = descriptor.chars();
    let cat = consume_field(&mut chars, descriptor)?;
    if chars.next().is_some() {
        return Err(bad(descriptor));
    }
    Ok(cat)
}

/// Return-type descriptor of a method descriptor, the text after `)`.
pub fn return_descriptor(descriptor: &str) -> Option<&str> {
    descriptor.split_once(')').map(|(_, ret)| ret)
}

/// Argument categories and return category (None for void) of a method
/// descriptor such as `(ILjava/lang/String;)J`.
pub fn method_categories(descriptor: &str) -> Result<(Vec<Category>, Option<Category>)> {
    let rest = descriptor.strip_prefix('(').ok_or_else(|| bad(descriptor))?;
    let close = rest.find(')').ok_or_else(|| bad(descriptor))?;
    let (params, ret) = (&rest[..close], &rest[close + 1..]);

    let mut args = Vec::new();
    let mut chars = params.chars();
    loop {
        let remaining = chars.as_str();
        if remaining.is_empty() {
            break;
        }
        args.push(consume_field(&mut chars, descriptor)?);
    }

    let ret = match ret {
        "V" => None,
        _ => Some(field_category(ret).map_err(|_| bad(descriptor))?),
    };
    Ok((args, ret))
}
