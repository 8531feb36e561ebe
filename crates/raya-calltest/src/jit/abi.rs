//! Machine-type and boxed-value helpers for Cranelift IR generation
//!
//! Maps [`MachineSignature`]s onto Cranelift signatures and emits inline
//! boxing/unboxing of tagged values. The encoding mirrors
//! [`Value`](crate::Value).

use cranelift_codegen::ir::{self, types, AbiParam, InstBuilder};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::FunctionBuilder;

use crate::machine::MachineType;
use crate::signature::MachineSignature;
use crate::value::Value;

// Tagged-value constants (from value.rs)
/// Mask of the tag bits
pub const TAG_MASK: u64 = Value::TAG_MASK;
/// Tag of inline i32s
pub const TAG_I32: u64 = Value::TAG_I32;
/// Tag of booleans
pub const TAG_BOOL: u64 = Value::TAG_BOOL;
/// Raw bits of null
pub const NULL_VALUE: u64 = Value::TAG_NULL;
/// Position of the i32 payload
pub const I32_SHIFT: i64 = 32;
/// Position of the bool payload bit
pub const BOOL_SHIFT: i64 = 3;

/// Cranelift type of a machine kind
pub fn clif_type(ty: MachineType, pointer_type: ir::Type) -> ir::Type {
    match ty {
        MachineType::Int8 | MachineType::Uint8 => types::I8,
        MachineType::Int16 | MachineType::Uint16 => types::I16,
        MachineType::Int32 | MachineType::Uint32 => types::I32,
        MachineType::Int64 | MachineType::Uint64 => types::I64,
        MachineType::Pointer => pointer_type,
        MachineType::Float32 => types::F32,
        MachineType::Float64 => types::F64,
        MachineType::AnyTagged => types::I64,
    }
}

/// ABI parameter for a machine kind.
///
/// Narrow integers are extended to a full register as the C convention
/// expects at the call boundary.
pub fn abi_param(ty: MachineType, pointer_type: ir::Type) -> AbiParam {
    let param = AbiParam::new(clif_type(ty, pointer_type));
    match ty {
        MachineType::Int8 | MachineType::Int16 => param.sext(),
        MachineType::Uint8 | MachineType::Uint16 => param.uext(),
        _ => param,
    }
}

/// Lower a machine signature to a Cranelift signature
pub fn lower_signature(
    signature: &MachineSignature,
    call_conv: CallConv,
    pointer_type: ir::Type,
) -> ir::Signature {
    let mut sig = ir::Signature::new(call_conv);
    for &param in signature.params() {
        sig.params.push(abi_param(param, pointer_type));
    }
    if let Some(ret) = signature.return_type() {
        sig.returns.push(abi_param(ret, pointer_type));
    }
    sig
}

/// Box an i32 into a tagged value.
///
/// Cranelift IR equivalent of: `((i as i64 as u64) << 32) | TAG_I32`
pub fn emit_box_i32(builder: &mut FunctionBuilder<'_>, val: ir::Value) -> ir::Value {
    let extended = builder.ins().sextend(types::I64, val);
    let shifted = builder.ins().ishl_imm(extended, I32_SHIFT);
    builder.ins().bor_imm(shifted, TAG_I32 as i64)
}

/// Unbox an i32 from a tagged value (no tag check).
pub fn emit_unbox_i32(builder: &mut FunctionBuilder<'_>, val: ir::Value) -> ir::Value {
    let shifted = builder.ins().sshr_imm(val, I32_SHIFT);
    builder.ins().ireduce(types::I32, shifted)
}

/// Box a boolean (i8 0/1) into a tagged value.
pub fn emit_box_bool(builder: &mut FunctionBuilder<'_>, val: ir::Value) -> ir::Value {
    let extended = builder.ins().uextend(types::I64, val);
    let shifted = builder.ins().ishl_imm(extended, BOOL_SHIFT);
    builder.ins().bor_imm(shifted, TAG_BOOL as i64)
}

/// Emit a null constant
pub fn emit_null(builder: &mut FunctionBuilder<'_>) -> ir::Value {
    builder.ins().iconst(types::I64, NULL_VALUE as i64)
}
