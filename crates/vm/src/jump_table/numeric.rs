//! Bitwise, arithmetic, boolean and comparison opcodes.

use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{check_integer_range, StackItem};
use crate::{VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode() {
        Invert => unary(engine, |x| Ok(!x)),
        And => binary(engine, |a, b| Ok(a & b)),
        Or => binary(engine, |a, b| Ok(a | b)),
        Xor => binary(engine, |a, b| Ok(a ^ b)),

        Equal => {
            let b = engine.pop()?;
            let a = engine.pop()?;
            let max = engine.limits().max_comparable_size;
            let equal = a.equals(&b, max)?;
            engine.push(StackItem::from_bool(equal))
        }
        NotEqual => {
            let b = engine.pop()?;
            let a = engine.pop()?;
            let max = engine.limits().max_comparable_size;
            let equal = a.equals(&b, max)?;
            engine.push(StackItem::from_bool(!equal))
        }

        Sign => unary(engine, |x| Ok(x.signum())),
        Abs => unary(engine, |x| Ok(x.abs())),
        Negate => unary(engine, |x| Ok(-x)),
        Inc => unary(engine, |x| Ok(x + 1)),
        Dec => unary(engine, |x| Ok(x - 1)),
        Add => binary(engine, |a, b| Ok(a + b)),
        Sub => binary(engine, |a, b| Ok(a - b)),
        Mul => binary(engine, |a, b| Ok(a * b)),
        Div => binary(engine, |a, b| {
            if b.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            Ok(a / b)
        }),
        Mod => binary(engine, |a, b| {
            if b.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            Ok(a % b)
        }),
        Pow => {
            let exponent = engine.pop_i32()?;
            let base = engine.pop_int()?;
            if exponent < 0 {
                return Err(VmError::invalid_operation("negative exponent"));
            }
            let result = num_traits::pow(base, exponent as usize);
            check_integer_range(&result)?;
            engine.push(StackItem::Integer(result))
        }
        Sqrt => unary(engine, |x| {
            if x.is_negative() {
                return Err(VmError::invalid_operation("SQRT of a negative value"));
            }
            Ok(x.sqrt())
        }),
        ModMul => {
            let modulus = engine.pop_int()?;
            let b = engine.pop_int()?;
            let a = engine.pop_int()?;
            if modulus.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            let result = (a * b) % &modulus;
            engine.push(StackItem::Integer(result))
        }
        ModPow => {
            let modulus = engine.pop_int()?;
            let exponent = engine.pop_int()?;
            let base = engine.pop_int()?;
            if modulus.is_zero() {
                return Err(VmError::DivisionByZero);
            }
            if modulus.is_negative() {
                return Err(VmError::invalid_operation("negative modulus"));
            }
            let result = if exponent == BigInt::from(-1) {
                // Exponent -1 asks for the modular inverse.
                modular_inverse(&base, &modulus)?
            } else {
                if exponent.is_negative() {
                    return Err(VmError::invalid_operation("negative exponent"));
                }
                base.modpow(&exponent, &modulus)
            };
            engine.push(StackItem::Integer(result))
        }
        Shl => shift(engine, true),
        Shr => shift(engine, false),

        Not => {
            let x = engine.pop_bool()?;
            engine.push(StackItem::from_bool(!x))
        }
        BoolAnd => {
            let b = engine.pop_bool()?;
            let a = engine.pop_bool()?;
            engine.push(StackItem::from_bool(a && b))
        }
        BoolOr => {
            let b = engine.pop_bool()?;
            let a = engine.pop_bool()?;
            engine.push(StackItem::from_bool(a || b))
        }
        Nz => {
            let x = engine.pop_int()?;
            engine.push(StackItem::from_bool(!x.is_zero()))
        }
        NumEqual => compare(engine, |a, b| a == b),
        NumNotEqual => compare(engine, |a, b| a != b),
        Lt => compare_nullable(engine, |a, b| a < b),
        Le => compare_nullable(engine, |a, b| a <= b),
        Gt => compare_nullable(engine, |a, b| a > b),
        Ge => compare_nullable(engine, |a, b| a >= b),
        Min => binary(engine, |a, b| Ok(a.min(b))),
        Max => binary(engine, |a, b| Ok(a.max(b))),
        Within => {
            let b = engine.pop_int()?;
            let a = engine.pop_int()?;
            let x = engine.pop_int()?;
            engine.push(StackItem::from_bool(a <= x && x < b))
        }

        other => Err(VmError::invalid_operation(format!(
            "{other:?} is not a numeric opcode"
        ))),
    }
}

fn unary(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let x = engine.pop_int()?;
    let result = f(x)?;
    check_integer_range(&result)?;
    engine.push(StackItem::Integer(result))
}

fn binary(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(BigInt, BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    let result = f(a, b)?;
    check_integer_range(&result)?;
    engine.push(StackItem::Integer(result))
}

fn compare(engine: &mut ExecutionEngine, f: impl FnOnce(&BigInt, &BigInt) -> bool) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    engine.push(StackItem::from_bool(f(&a, &b)))
}

/// Ordered comparisons treat any null operand as unequal-incomparable:
/// the result is false unless both sides are numeric.
fn compare_nullable(
    engine: &mut ExecutionEngine,
    f: impl FnOnce(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let b = engine.pop()?;
    let a = engine.pop()?;
    if a.is_null() || b.is_null() {
        return engine.push(StackItem::from_bool(false));
    }
    let result = f(&a.get_integer()?, &b.get_integer()?);
    engine.push(StackItem::from_bool(result))
}

fn shift(engine: &mut ExecutionEngine, left: bool) -> VmResult<()> {
    let shift = engine.pop_i32()?;
    if shift < 0 || shift as u32 > engine.limits().max_shift {
        return Err(VmError::invalid_operation(format!("invalid shift {shift}")));
    }
    let value = engine.pop_int()?;
    if shift == 0 {
        return engine.push(StackItem::Integer(value));
    }
    let result = if left {
        value << shift as usize
    } else {
        value >> shift as usize
    };
    check_integer_range(&result)?;
    engine.push(StackItem::Integer(result))
}

fn modular_inverse(value: &BigInt, modulus: &BigInt) -> VmResult<BigInt> {
    // Extended Euclid; fails when gcd(value, modulus) != 1.
    let modulus = modulus.abs();
    let (mut old_r, mut r) = (((value % &modulus) + &modulus) % &modulus, modulus.clone());
    let (mut old_s, mut s) = (BigInt::from(1), BigInt::from(0));
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    if old_r != BigInt::from(1) {
        return Err(VmError::invalid_operation("value has no modular inverse"));
    }
    Ok(((old_s % &modulus) + &modulus) % &modulus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionEngineLimits;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::VMState;

    fn run(build: impl FnOnce(&mut ScriptBuilder)) -> ExecutionEngine {
        let mut sb = ScriptBuilder::new();
        build(&mut sb);
        let mut engine = ExecutionEngine::new(ExecutionEngineLimits::default());
        engine.load_script(Script::new(sb.into_bytes()), -1).unwrap();
        engine.execute();
        engine
    }

    fn top_int(engine: &ExecutionEngine) -> BigInt {
        engine.result_stack().peek(0).unwrap().get_integer().unwrap()
    }

    #[test]
    fn test_truncated_division() {
        let engine = run(|sb| {
            sb.emit_push_int(-7);
            sb.emit_push_int(2);
            sb.emit(OpCode::Div);
        });
        assert_eq!(top_int(&engine), BigInt::from(-3));

        let engine = run(|sb| {
            sb.emit_push_int(-7);
            sb.emit_push_int(2);
            sb.emit(OpCode::Mod);
        });
        assert_eq!(top_int(&engine), BigInt::from(-1));
    }

    #[test]
    fn test_overflow_faults() {
        // (2^255 - 1) + 1 leaves the representable range.
        let engine = run(|sb| {
            sb.emit_push_int((BigInt::from(1) << 255) - 1);
            sb.emit(OpCode::Inc);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_pow_sqrt() {
        let engine = run(|sb| {
            sb.emit_push_int(3);
            sb.emit_push_int(4);
            sb.emit(OpCode::Pow);
        });
        assert_eq!(top_int(&engine), BigInt::from(81));

        let engine = run(|sb| {
            sb.emit_push_int(80);
            sb.emit(OpCode::Sqrt);
        });
        assert_eq!(top_int(&engine), BigInt::from(8));

        let engine = run(|sb| {
            sb.emit_push_int(-1);
            sb.emit(OpCode::Sqrt);
        });
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_modpow_inverse() {
        // 3 * 5 = 15 ≡ 1 (mod 7)
        let engine = run(|sb| {
            sb.emit_push_int(3);
            sb.emit_push_int(-1);
            sb.emit_push_int(7);
            sb.emit(OpCode::ModPow);
        });
        assert_eq!(top_int(&engine), BigInt::from(5));
    }

    #[test]
    fn test_comparisons_with_null() {
        let engine = run(|sb| {
            sb.emit_push_null();
            sb.emit_push_int(1);
            sb.emit(OpCode::Lt);
        });
        assert_eq!(engine.state(), VMState::HALT);
        assert!(!engine.result_stack().peek(0).unwrap().get_bool());
    }

    #[test]
    fn test_within() {
        let engine = run(|sb| {
            sb.emit_push_int(5);
            sb.emit_push_int(5);
            sb.emit_push_int(7);
            sb.emit(OpCode::Within);
        });
        assert!(engine.result_stack().peek(0).unwrap().get_bool());

        let engine = run(|sb| {
            sb.emit_push_int(7);
            sb.emit_push_int(5);
            sb.emit_push_int(7);
            sb.emit(OpCode::Within);
        });
        assert!(!engine.result_stack().peek(0).unwrap().get_bool());
    }

    #[test]
    fn test_shift_bounds() {
        let engine = run(|sb| {
            sb.emit_push_int(1);
            sb.emit_push_int(257);
            sb.emit(OpCode::Shl);
        });
        assert_eq!(engine.state(), VMState::FAULT);

        let engine = run(|sb| {
            sb.emit_push_int(8);
            sb.emit_push_int(2);
            sb.emit(OpCode::Shr);
        });
        assert_eq!(top_int(&engine), BigInt::from(2));
    }

    #[test]
    fn test_equal_uses_structural_rules() {
        let engine = run(|sb| {
            sb.emit_push_bytes(&[1]);
            sb.emit_push_int(1);
            sb.emit(OpCode::Equal);
        });
        assert!(engine.result_stack().peek(0).unwrap().get_bool());
    }
}
