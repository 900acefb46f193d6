//! Base execution prices per opcode, in datoshi before the Policy
//! exec-fee factor is applied.

use neo_vm::OpCode;

/// The base price of one opcode.
pub fn opcode_price(opcode: OpCode) -> i64 {
    use OpCode::*;
    match opcode {
        PushInt8 | PushInt16 | PushInt32 | PushInt64 | PushNull | PushM1 | Push0 | Push1
        | Push2 | Push3 | Push4 | Push5 | Push6 | Push7 | Push8 | Push9 | Push10 | Push11
        | Push12 | Push13 | Push14 | Push15 | Push16 | PushT | PushF | Nop | Assert => 1,
        PushInt128 | PushInt256 | PushA | Try | TryL | EndTry | EndTryL | EndFinally => 1 << 2,
        PushData1 | Depth | Drop | Nip | Xdrop | Clear | Dup | Over | Pick | Tuck | Swap
        | Rot | Roll | Reverse3 | Reverse4 | ReverseN | InitSSlot | LdSFld0 | LdSFld1
        | LdSFld2 | LdSFld3 | LdSFld4 | LdSFld5 | LdSFld6 | LdSFld | StSFld0 | StSFld1
        | StSFld2 | StSFld3 | StSFld4 | StSFld5 | StSFld6 | StSFld | LdLoc0 | LdLoc1
        | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 | LdLoc | StLoc0 | StLoc1 | StLoc2
        | StLoc3 | StLoc4 | StLoc5 | StLoc6 | StLoc | LdArg0 | LdArg1 | LdArg2 | LdArg3
        | LdArg4 | LdArg5 | LdArg6 | LdArg | StArg0 | StArg1 | StArg2 | StArg3 | StArg4
        | StArg5 | StArg6 | StArg | Invert | And | Or | Xor | Sign | Abs | Negate | Inc
        | Dec | Add | Sub | Mul | Div | Mod | Shl | Shr | Not | BoolAnd | BoolOr | Nz
        | NumEqual | NumNotEqual | Lt | Le | Gt | Ge | Min | Max | Within | Jmp | JmpL
        | JmpIf | JmpIfL | JmpIfNot | JmpIfNotL | JmpEq | JmpEqL | JmpNe | JmpNeL | JmpGt
        | JmpGtL | JmpGe | JmpGeL | JmpLt | JmpLtL | JmpLe | JmpLeL | Size | IsNull
        | IsType | Ret => 1 << 1,
        PushData2 | Memcpy | Cat | SubStr | Left | Right | Sqrt | Pow | ModMul | ModPow
        | NewBuffer | Keys | PickItem | Append | SetItem | Remove | ClearItems | PopItem
        | ReverseItems | Equal | NotEqual | Convert | InitSlot | NewArrayT => 1 << 8,
        PushData4 => 1 << 12,
        NewArray0 | NewStruct0 | NewMap | HasKey => 1 << 4,
        NewArray | NewStruct | Values | Unpack => 1 << 9,
        Pack | PackMap | PackStruct => 1 << 11,
        Call | CallL | CallA | CallT => 1 << 15,
        // The interop descriptor carries the dispatch cost.
        Syscall => 0,
        Abort | AbortMsg | AssertMsg | Throw => 0,
    }
}
