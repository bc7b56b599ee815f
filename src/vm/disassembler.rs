//! Bytecode disassembler for debug output. An ad hoc dump, not a stable
//! interchange format.

use super::code::{CodeObject, Constant};
use super::opcode::Op;

/// Disassemble a code object (and its nested functions) to a
/// human-readable string.
pub fn disassemble(code: &CodeObject) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "== {} (file={}, args={}, stack={}) ==\n",
        code.name, code.file, code.argcount, code.stack_size
    ));

    let bytes = &code.code;
    let mut offset = 0;
    let mut last_line = 0;
    while offset + 1 < bytes.len() {
        let start = offset;
        let mut arg: u32 = 0;
        let mut op_byte = bytes[offset];
        while op_byte == Op::ExtArg as u8 {
            arg = (arg << 8) | bytes[offset + 1] as u32;
            offset += 2;
            op_byte = bytes[offset];
        }
        arg = (arg << 8) | bytes[offset + 1] as u32;
        offset += 2;

        let line = code.line_at(start);
        let line_str = if line == last_line {
            "   |".to_string()
        } else {
            last_line = line;
            format!("{:4}", line)
        };

        match Op::from_byte(op_byte) {
            Some(op) => {
                out.push_str(&format!("{:04} {} {:<22} {:>5}", start, line_str, op.name(), arg));
                if let Some(note) = annotate(code, op, arg) {
                    out.push_str(&format!(" ({})", note));
                }
            }
            None => {
                out.push_str(&format!("{:04} {} <bad opcode {:#04x}>", start, line_str, op_byte));
            }
        }
        out.push('\n');
    }

    for constant in &code.consts {
        if let Constant::Code(nested) = constant {
            out.push('\n');
            out.push_str(&disassemble(nested));
        }
    }

    out
}

fn annotate(code: &CodeObject, op: Op, arg: u32) -> Option<String> {
    match op {
        Op::LoadConst | Op::ImportName => {
            Some(format_constant(code.consts.get(arg as usize)))
        }
        Op::MakeFunction => Some(format_constant(code.consts.get(arg as usize))),
        Op::LoadName
        | Op::StoreName
        | Op::StoreGlobal
        | Op::LoadVarname
        | Op::LoadAttr
        | Op::StoreAttr
        | Op::BindMethod => code.varnames.get(arg as usize).map(|n| n.clone()),
        Op::Jump
        | Op::PopJumpIfFalse
        | Op::PopJumpIfTrue
        | Op::JumpIfFalseOrPop
        | Op::JumpIfTrueOrPop
        | Op::SetupLoop
        | Op::ContinueLoop
        | Op::SetupTry
        | Op::SetupFinally => Some(format!("to {}", arg)),
        Op::CompareOp => super::opcode::COMPARE_OPERATORS
            .get(arg as usize)
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn format_constant(constant: Option<&Constant>) -> String {
    match constant {
        Some(Constant::Null) => "null".to_string(),
        Some(Constant::Bool(b)) => b.to_string(),
        Some(Constant::Int(v)) => v.to_string(),
        Some(Constant::Float(v)) => v.to_string(),
        Some(Constant::Str(s)) => format!("{:?}", s),
        Some(Constant::Code(code)) => format!("<code {}>", code.name),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::vm::Compiler;

    #[test]
    fn lists_instructions_with_annotations() {
        let program = parse_source("x = 1\nprint x").unwrap();
        let code = Compiler::compile(&program, "<test>").unwrap();
        let listing = disassemble(&code);
        assert!(listing.contains("LOAD_CONST"));
        assert!(listing.contains("STORE_NAME"));
        assert!(listing.contains("(x)"));
        assert!(listing.contains("PRINT"));
    }

    #[test]
    fn nested_functions_are_included() {
        let program = parse_source("func f() { return 1 }").unwrap();
        let code = Compiler::compile(&program, "<test>").unwrap();
        let listing = disassemble(&code);
        assert!(listing.contains("== f "));
    }
}
