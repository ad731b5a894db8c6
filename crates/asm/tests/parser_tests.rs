// TDB - TinyVM Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Grammar coverage for the assembly parser.

use tdb_asm::{parse_instruction, parse_program};
use tdb_common::{
    logging::ensure_test_logging,
    types::{Instruction, MemAddr, Opcode, Operand, Register},
};

#[test]
fn test_example_program() {
    ensure_test_logging(None);
    let program = parse_program(
        r#"
.text
    0 MOV R0, 5
    MOV [R0 + 3 + R1 * 2], 7
    JZ [R0 + 1]
    HALT
.data
    "hello\n"
    42
"#,
    )
    .unwrap();

    assert_eq!(program.instructions.len(), 4);
    assert_eq!(
        program.instructions[0],
        Instruction::new(Opcode::Mov, vec![Operand::Reg(Register::General(0)), Operand::Imm(5)])
    );
    assert_eq!(
        program.instructions[1].operands[0],
        Operand::Mem(MemAddr::RegImmRegScaled(Register::General(0), 3, Register::General(1), 2))
    );
    assert_eq!(program.instructions[3], Instruction::new(Opcode::Halt, vec![]));

    let mut expected_data: Vec<i64> = "hello\n".bytes().map(i64::from).collect();
    expected_data.push(42);
    assert_eq!(program.data, expected_data);
}

/// Every operand form of the grammar survives a parse → display →
/// parse round trip structurally unchanged.
#[test]
fn test_operand_round_trip() {
    ensure_test_logging(None);
    let forms = [
        "0",
        "-7",
        "R1",
        "R1 + 3",
        "R1 + -3",
        "[1]",
        "[R1]",
        "[R1 + 2]",
        "[BP + -8]",
        "[R1 + R2]",
        "[R1 * 4]",
        "[R1 + R2 * 4]",
        "[R1 + 2 + R2]",
        "[R1 + 2 + R2 * 4]",
    ];
    for form in forms {
        let text = format!("MOV {form}, 0");
        let parsed = parse_instruction(&text).unwrap();
        let emitted = parsed.to_string();
        let reparsed = parse_instruction(&emitted).unwrap();
        assert_eq!(parsed, reparsed, "operand form '{form}' did not round trip");
    }
}

#[test]
fn test_mov_accepts_the_full_operand_set() {
    let ins = parse_instruction("MOV [R0 + 3 + R1 * 2], R4 + 1").unwrap();
    assert_eq!(
        ins,
        Instruction::new(
            Opcode::Mov,
            vec![
                Operand::Mem(MemAddr::RegImmRegScaled(
                    Register::General(0),
                    3,
                    Register::General(1),
                    2
                )),
                Operand::RegImm(Register::General(4), 1),
            ]
        )
    );
}

#[test]
fn test_register_aliases() {
    let ins = parse_instruction("MOV BP, SP").unwrap();
    assert_eq!(
        ins,
        Instruction::new(Opcode::Mov, vec![Operand::Reg(Register::Bp), Operand::Reg(Register::Sp)])
    );
    let ins = parse_instruction("JMP IP").unwrap();
    assert_eq!(ins, Instruction::new(Opcode::Jmp, vec![Operand::Reg(Register::Ip)]));
}

#[test]
fn test_bad_register_name_is_an_error() {
    let err = parse_instruction("INC FOO").unwrap_err();
    assert!(err.message.contains("Registers must begin with an R"));
}

#[test]
fn test_arithmetic_signatures() {
    // Register destination with immediate, register or simple memory
    // sources.
    for src in ["5", "R1", "[5]", "[R1]", "[R1 + 2]"] {
        parse_instruction(&format!("ADD R0, {src}")).unwrap();
        parse_instruction(&format!("CMP R0, {src}")).unwrap();
    }
    // Arbitrary memory forms are only for MOV.
    assert!(parse_instruction("ADD R0, [R1 + R2]").is_err());
    // Immediate destinations make no sense.
    assert!(parse_instruction("ADD 5, R0").is_err());
}

#[test]
fn test_conditional_jumps_accept_simple_memory() {
    for target in ["7", "R1", "[7]", "[R1]", "[R1 + 1]"] {
        for jump in ["JZ", "JNZ", "JE", "JNE", "JG", "JGE", "JL", "JLE", "JA", "JAE", "JB", "JBE", "JO", "JNO", "JS", "JNS"] {
            parse_instruction(&format!("{jump} {target}")).unwrap();
        }
    }
    // JMP is stricter: immediate or register only.
    parse_instruction("JMP 7").unwrap();
    parse_instruction("JMP R1").unwrap();
    assert!(parse_instruction("JMP [7]").is_err());
}

#[test]
fn test_nullary_instructions() {
    for ins in ["HALT", "NOP", "BKPT", "BREAK", "RET"] {
        let parsed = parse_instruction(ins).unwrap();
        assert!(parsed.operands.is_empty());
    }
}

#[test]
fn test_lea_requires_register_destination() {
    parse_instruction("LEA R0, [BP + -2]").unwrap();
    assert!(parse_instruction("LEA [BP + -2], R0").is_err());
}

#[test]
fn test_dbg_is_rejected_with_a_specific_error() {
    let err = parse_instruction("DBG").unwrap_err();
    assert_eq!(err.message, "DBG instruction is not supported");
}

#[test]
fn test_unknown_instruction() {
    let err = parse_instruction("FROB R0").unwrap_err();
    assert!(err.message.contains("Unknown instruction FROB"));
}

#[test]
fn test_addresses_are_ignored() {
    let with_addresses = parse_program(".text\n0 NOP\n1 NOP\n2 HALT\n").unwrap();
    let without = parse_program(".text\nNOP\nNOP\nHALT\n").unwrap();
    assert_eq!(with_addresses, without);
}

#[test]
fn test_unknown_sections_are_skipped() {
    let program = parse_program(".bss\nsome junk 4 2\n.text\nNOP\n.debug_line\n0 0\n").unwrap();
    assert_eq!(program.instructions.len(), 1);
}

#[test]
fn test_file_without_sections_is_an_error() {
    let err = parse_program("MOV R0, 1\n").unwrap_err();
    assert!(err.message.contains("File does not contain any sections"));
}

#[test]
fn test_data_section_mixes_strings_and_numbers() {
    let program = parse_program(".data\n\"ab\"\n7\n\"c\"\n").unwrap();
    assert_eq!(program.data, vec![97, 98, 7, 99]);
}

#[test]
fn test_errors_carry_positions() {
    let err = parse_program(".text\nMOV R0,\n").unwrap_err();
    assert_eq!(err.row, 2);
    let err = parse_program(".text\n  ADD R0 R1\n").unwrap_err();
    assert_eq!((err.row, err.col), (1, 9));
    assert!(err.message.contains("Expected ','"));
}

#[test]
fn test_comments_are_ignored() {
    let program = parse_program("# leading\n.text\nNOP # trailing\nHALT\n").unwrap();
    assert_eq!(program.instructions.len(), 2);
}

#[test]
fn test_missing_comma_between_operands() {
    let err = parse_instruction("MOV R0 5").unwrap_err();
    assert!(err.message.contains("Expected ','"));
}
