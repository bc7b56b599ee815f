//! Bytecode opcodes for the Rill VM.
//!
//! The instruction stream is raw bytes: every instruction is exactly two
//! bytes `(opcode, operand)`. Operands wider than one byte are carried by
//! one or more `ExtArg` prefixes, each contributing eight higher bits.
//! Jump operands are absolute byte offsets into the same code object's
//! stream and always carry exactly one speculative `ExtArg` prefix, so
//! resolving a jump target never changes the width of emitted code.

/// Byte size of one encoded instruction.
pub const INSTRUCTION_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Operand prefix: shifts the accumulated operand left by 8 bits.
    ExtArg = 0x00,

    // --- Constants & names ---
    /// Push a constant from the pool.
    LoadConst = 0x01,
    /// Push a variable: locals, captured scopes (innermost first), globals,
    /// builtins; a miss is a name-resolution error.
    LoadName = 0x02,
    /// Pop and store a variable through the scope chain.
    StoreName = 0x03,
    /// Pop and store a variable directly in the global scope.
    StoreGlobal = 0x04,
    /// Push the variable-name string itself (struct fields, input targets).
    LoadVarname = 0x05,

    // --- Attributes & subscripts ---
    /// Pop object, push attribute.
    LoadAttr = 0x06,
    /// Pop object then value, set attribute.
    StoreAttr = 0x07,
    /// Pop index then object, push element.
    LoadSubscr = 0x08,
    /// Pop index, object, value; set element.
    StoreSubscr = 0x09,

    // --- Stack manipulation ---
    PopTop = 0x0a,
    DupTop = 0x0b,

    // --- Operators ---
    UnaryNeg = 0x0c,
    UnaryNot = 0x0d,
    BinaryAdd = 0x0e,
    BinarySub = 0x0f,
    BinaryMul = 0x10,
    BinaryDiv = 0x11,
    BinaryRem = 0x12,
    BinaryPow = 0x13,
    /// Operand indexes COMPARE_OPERATORS.
    CompareOp = 0x14,

    // --- Jumps (absolute byte offsets) ---
    Jump = 0x15,
    PopJumpIfFalse = 0x16,
    PopJumpIfTrue = 0x17,
    /// Short-circuit &&: jump if falsy keeping the value, else pop.
    JumpIfFalseOrPop = 0x18,
    /// Short-circuit ||: jump if truthy keeping the value, else pop.
    JumpIfTrueOrPop = 0x19,

    // --- Loops ---
    /// Push a loop block; operand is the break target.
    SetupLoop = 0x1a,
    /// Pop the loop block on normal exit.
    PopLoop = 0x1b,
    /// Unwind to the innermost loop's break target.
    BreakLoop = 0x1c,
    /// Unwind to the operand (the innermost loop's continue target).
    ContinueLoop = 0x1d,

    // --- Protected regions ---
    /// Push a catch-protected region; operand is the handler entry.
    SetupTry = 0x1e,
    /// Leave a catch-protected region on the normal path.
    PopTry = 0x1f,
    /// Push a finally-protected region; operand is the finally entry.
    SetupFinally = 0x20,
    /// Leave a finally-protected region on the normal path.
    PopFinally = 0x21,
    /// Push the Normal unwind signal (normal-path entry into a finally tail).
    PushNormal = 0x22,
    /// Pop the unwind signal and resume the action it describes.
    EndFinally = 0x23,
    /// Pop a kind-name string and an error value, push whether they match.
    ExcMatch = 0x24,
    /// Mark the pending error as handled (end of a catch body).
    CatchDone = 0x25,
    /// Pop a value and raise: errors re-raise, anything else is user-thrown.
    Throw = 0x26,
    /// Pop a message and raise an assertion error.
    AssertFail = 0x27,

    // --- Functions ---
    /// Call with N positional arguments (callee below them).
    CallFunc = 0x28,
    /// Pop the return value and leave the frame.
    ReturnValue = 0x29,
    /// Create a function value from a code-object constant, capturing the
    /// defining frame's scopes when the code is flagged as a closure.
    MakeFunction = 0x2a,
    /// Pop a function and attach it as a method on the named struct type.
    BindMethod = 0x2b,

    // --- Aggregates ---
    /// Build an array from N stacked elements.
    BuildArray = 0x2c,
    /// Build a map from N stacked key/value pairs (2N values).
    BuildMap = 0x2d,
    /// Build a struct type from N stacked field names plus the type name.
    BuildStruct = 0x2e,

    // --- I/O & modules ---
    /// Print N stacked values as one line.
    Print = 0x2f,
    /// Pop N target names and a prompt, read a line, bind the words.
    InputLine = 0x30,
    /// Import a module by path constant and merge its namespace.
    ImportName = 0x31,
}

/// Comparison operators indexed by CompareOp's operand.
pub const COMPARE_OPERATORS: [&str; 6] = ["==", "!=", "<", "<=", ">", ">="];

pub const CMP_EQ: u32 = 0;
pub const CMP_NE: u32 = 1;
pub const CMP_LT: u32 = 2;
pub const CMP_LE: u32 = 3;
pub const CMP_GT: u32 = 4;
pub const CMP_GE: u32 = 5;

impl Op {
    pub fn from_byte(byte: u8) -> Option<Op> {
        Some(match byte {
            0x00 => Op::ExtArg,
            0x01 => Op::LoadConst,
            0x02 => Op::LoadName,
            0x03 => Op::StoreName,
            0x04 => Op::StoreGlobal,
            0x05 => Op::LoadVarname,
            0x06 => Op::LoadAttr,
            0x07 => Op::StoreAttr,
            0x08 => Op::LoadSubscr,
            0x09 => Op::StoreSubscr,
            0x0a => Op::PopTop,
            0x0b => Op::DupTop,
            0x0c => Op::UnaryNeg,
            0x0d => Op::UnaryNot,
            0x0e => Op::BinaryAdd,
            0x0f => Op::BinarySub,
            0x10 => Op::BinaryMul,
            0x11 => Op::BinaryDiv,
            0x12 => Op::BinaryRem,
            0x13 => Op::BinaryPow,
            0x14 => Op::CompareOp,
            0x15 => Op::Jump,
            0x16 => Op::PopJumpIfFalse,
            0x17 => Op::PopJumpIfTrue,
            0x18 => Op::JumpIfFalseOrPop,
            0x19 => Op::JumpIfTrueOrPop,
            0x1a => Op::SetupLoop,
            0x1b => Op::PopLoop,
            0x1c => Op::BreakLoop,
            0x1d => Op::ContinueLoop,
            0x1e => Op::SetupTry,
            0x1f => Op::PopTry,
            0x20 => Op::SetupFinally,
            0x21 => Op::PopFinally,
            0x22 => Op::PushNormal,
            0x23 => Op::EndFinally,
            0x24 => Op::ExcMatch,
            0x25 => Op::CatchDone,
            0x26 => Op::Throw,
            0x27 => Op::AssertFail,
            0x28 => Op::CallFunc,
            0x29 => Op::ReturnValue,
            0x2a => Op::MakeFunction,
            0x2b => Op::BindMethod,
            0x2c => Op::BuildArray,
            0x2d => Op::BuildMap,
            0x2e => Op::BuildStruct,
            0x2f => Op::Print,
            0x30 => Op::InputLine,
            0x31 => Op::ImportName,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::ExtArg => "EXT_ARG",
            Op::LoadConst => "LOAD_CONST",
            Op::LoadName => "LOAD_NAME",
            Op::StoreName => "STORE_NAME",
            Op::StoreGlobal => "STORE_GLOBAL",
            Op::LoadVarname => "LOAD_VARNAME",
            Op::LoadAttr => "LOAD_ATTR",
            Op::StoreAttr => "STORE_ATTR",
            Op::LoadSubscr => "LOAD_SUBSCR",
            Op::StoreSubscr => "STORE_SUBSCR",
            Op::PopTop => "POP_TOP",
            Op::DupTop => "DUP_TOP",
            Op::UnaryNeg => "UNARY_NEG",
            Op::UnaryNot => "UNARY_NOT",
            Op::BinaryAdd => "BINARY_ADD",
            Op::BinarySub => "BINARY_SUB",
            Op::BinaryMul => "BINARY_MUL",
            Op::BinaryDiv => "BINARY_DIV",
            Op::BinaryRem => "BINARY_REM",
            Op::BinaryPow => "BINARY_POW",
            Op::CompareOp => "COMPARE_OP",
            Op::Jump => "JUMP",
            Op::PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            Op::PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            Op::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            Op::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            Op::SetupLoop => "SETUP_LOOP",
            Op::PopLoop => "POP_LOOP",
            Op::BreakLoop => "BREAK_LOOP",
            Op::ContinueLoop => "CONTINUE_LOOP",
            Op::SetupTry => "SETUP_TRY",
            Op::PopTry => "POP_TRY",
            Op::SetupFinally => "SETUP_FINALLY",
            Op::PopFinally => "POP_FINALLY",
            Op::PushNormal => "PUSH_NORMAL",
            Op::EndFinally => "END_FINALLY",
            Op::ExcMatch => "EXC_MATCH",
            Op::CatchDone => "CATCH_DONE",
            Op::Throw => "THROW",
            Op::AssertFail => "ASSERT_FAIL",
            Op::CallFunc => "CALL_FUNC",
            Op::ReturnValue => "RETURN_VALUE",
            Op::MakeFunction => "MAKE_FUNCTION",
            Op::BindMethod => "BIND_METHOD",
            Op::BuildArray => "BUILD_ARRAY",
            Op::BuildMap => "BUILD_MAP",
            Op::BuildStruct => "BUILD_STRUCT",
            Op::Print => "PRINT",
            Op::InputLine => "INPUT_LINE",
            Op::ImportName => "IMPORT_NAME",
        }
    }

    /// Whether the operand is an absolute jump target (and therefore gets
    /// the speculative extended-operand prefix).
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Op::Jump
                | Op::PopJumpIfFalse
                | Op::PopJumpIfTrue
                | Op::JumpIfFalseOrPop
                | Op::JumpIfTrueOrPop
                | Op::SetupLoop
                | Op::ContinueLoop
                | Op::SetupTry
                | Op::SetupFinally
        )
    }

    /// The statically known operand-stack delta, or `None` for the dynamic
    /// set whose effect the emitter must supply explicitly.
    pub fn stack_effect(self) -> Option<i32> {
        Some(match self {
            Op::ExtArg => 0,
            Op::LoadConst
            | Op::LoadName
            | Op::LoadVarname
            | Op::DupTop
            | Op::MakeFunction
            | Op::PushNormal => 1,
            Op::StoreName
            | Op::StoreGlobal
            | Op::PopTop
            | Op::BinaryAdd
            | Op::BinarySub
            | Op::BinaryMul
            | Op::BinaryDiv
            | Op::BinaryRem
            | Op::BinaryPow
            | Op::CompareOp
            | Op::PopJumpIfFalse
            | Op::PopJumpIfTrue
            | Op::JumpIfFalseOrPop
            | Op::JumpIfTrueOrPop
            | Op::LoadSubscr
            | Op::ExcMatch
            | Op::EndFinally
            | Op::Throw
            | Op::AssertFail
            | Op::ReturnValue
            | Op::BindMethod => -1,
            Op::LoadAttr | Op::UnaryNeg | Op::UnaryNot => 0,
            Op::StoreAttr => -2,
            Op::StoreSubscr => -3,
            Op::Jump
            | Op::SetupLoop
            | Op::PopLoop
            | Op::BreakLoop
            | Op::ContinueLoop
            | Op::SetupTry
            | Op::PopTry
            | Op::SetupFinally
            | Op::PopFinally
            | Op::CatchDone
            | Op::ImportName => 0,
            // Dynamic effects: call-with-N, build-aggregate-of-N, print-N,
            // input-N.
            Op::CallFunc | Op::BuildArray | Op::BuildMap | Op::BuildStruct | Op::Print
            | Op::InputLine => return None,
        })
    }

    /// The dynamic stack effect for count-dependent instructions.
    pub fn dynamic_stack_effect(self, arg: u32) -> Option<i32> {
        let n = arg as i32;
        Some(match self {
            Op::CallFunc => -n,
            Op::BuildArray => 1 - n,
            Op::BuildMap => 1 - 2 * n,
            Op::BuildStruct => -n,
            Op::Print => -n,
            Op::InputLine => -(n + 1),
            _ => return None,
        })
    }
}
