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

//! End-to-end tests of source-level debugging: line tables, scopes,
//! variable locations, type reconstruction and expression evaluation.

use tdb_common::{logging::ensure_test_logging, Arch, BpType, DebugEvent};
use tdb_engine::{
    source::{
        expr::TypedValue,
        loc::{LocExpr, Location, LocationInterpreter},
        parser::parse_debug_info,
    },
    test_utils::TestVm,
    Native, Source,
};

fn attach(program: &str) -> (Native, TestVm) {
    ensure_test_logging(None);
    let vm = TestVm::new(program, 4, 128).unwrap();
    let native = Native::new(Box::new(vm.clone()), Arch::default());
    (native, vm)
}

fn nops(count: usize) -> String {
    let mut program = String::from("\n.text\n");
    for _ in 0..count {
        program.push_str("NOP\n");
    }
    program.push_str("HALT\n");
    program
}

fn source_from(debug_info: &str) -> Source {
    Source::from_debug_info(parse_debug_info(debug_info).unwrap())
}

#[test]
fn test_line_mapping_round_trip() {
    let source = source_from(".debug_line\n0 2\n1 5\n2 6\n3 7\n4 11\n");
    for (line, addr) in source.line_entries() {
        assert_eq!(source.line_to_addr(line), Some(addr));
        let mapped_back = source.addr_to_line(addr).expect("address must map back");
        assert_eq!(source.line_to_addr(mapped_back), Some(addr));
    }
    assert_eq!(source.line_to_addr(9), None);
    assert_eq!(source.addr_to_line(3), None);
}

#[test]
fn test_addr_to_line_ties_break_high() {
    let source = source_from(".debug_line\n1 0\n2 0\n");
    assert_eq!(source.addr_to_line(0), Some(2));
}

#[test]
fn test_source_breakpoints_follow_the_line_table() {
    let (mut native, vm) = attach(&nops(6));
    native.wait_for_debug_event().unwrap();
    let source = source_from(".debug_line\n0 2\n1 4\n");

    assert_eq!(source.set_source_software_breakpoint(&mut native, 0).unwrap(), 2);
    assert_eq!(vm.raw_text(2), "BKPT");
    assert_eq!(source.disable_source_software_breakpoint(&mut native, 0).unwrap(), 2);
    assert_eq!(vm.raw_text(2), "NOP");
    assert_eq!(source.enable_source_software_breakpoint(&mut native, 0).unwrap(), 2);
    assert_eq!(source.unset_source_software_breakpoint(&mut native, 0).unwrap(), 2);
    assert_eq!(vm.raw_text(2), "NOP");

    // No mapping for that line.
    assert!(source.set_source_software_breakpoint(&mut native, 9).is_err());
    // No line mapping at all.
    let empty = Source::new();
    assert!(empty.set_source_software_breakpoint(&mut native, 0).is_err());
}

#[test]
fn test_step_in_stops_on_the_next_mapped_line() {
    let (mut native, _vm) = attach(&nops(6));
    native.wait_for_debug_event().unwrap();
    let source = source_from(".debug_line\n1 0\n2 2\n3 5\n");

    assert_eq!(source.addr_to_line(3), None);
    assert_eq!(source.addr_to_line(2), Some(2));

    // From address 0: address 1 has no line entry and is skipped.
    assert_eq!(source.step_in(&mut native).unwrap(), DebugEvent::Singlestep);
    assert_eq!(native.get_ip().unwrap(), 2);
    assert_eq!(source.step_in(&mut native).unwrap(), DebugEvent::Singlestep);
    assert_eq!(native.get_ip().unwrap(), 5);
}

#[test]
fn test_step_in_reports_other_events() {
    let (mut native, _vm) = attach(&nops(2));
    native.wait_for_debug_event().unwrap();
    // No mapped line is ever reached; stepping runs into the end of
    // execution and reports that instead.
    let source = source_from(".debug_line\n");
    assert_eq!(source.step_in(&mut native).unwrap(), DebugEvent::ExecutionEnd);
}

#[test]
fn test_step_over_stays_on_mapped_lines() {
    let program = "
.text
0 CALL 4
1 NOP
2 NOP
3 HALT
4 MOV R0, 7
5 RET
";
    let (mut native, _vm) = attach(program);
    native.wait_for_debug_event().unwrap();
    let source = source_from(".debug_line\n1 0\n2 2\n");

    // Stepping over the call does not descend into it: address 1 is
    // unmapped and skipped, stopping on address 2.
    assert_eq!(source.step_over(&mut native).unwrap(), DebugEvent::Singlestep);
    assert_eq!(native.get_ip().unwrap(), 2);
    assert_eq!(native.get_register("R0").unwrap(), 7);
}

const SCOPED_VARIABLES: &str = r#"
.debug_info
compile_unit [
    primitive_type id 0 name "signed_int" size 1 ;
    function id 1 name "main" begin_addr 0 end_addr 10 [
        variable id 2 name "x" type 0 location_expr [ frame_base_offset -1 ] ;
        variable id 3 name "y" type 0 location_expr [ frame_base_offset -3 ] ;
        scope id 4 begin_addr 4 end_addr 8 [
            variable id 5 name "x" type 0 location_expr [ frame_base_offset -2 ] ;
        ]
    ]
]
"#;

#[test]
fn test_variable_location_in_nested_scope() {
    // fn main [0..10) with a nested scope [4..8) declaring x at BP-8.
    let debug_info = r#"
.debug_info
compile_unit [
    primitive_type id 0 name "signed_int" size 1 ;
    function id 1 name "main" begin_addr 0 end_addr 10 [
        scope id 2 begin_addr 4 end_addr 8 [
            variable id 3 name "x" type 0 location_expr [ frame_base_offset -8 ] ;
        ]
    ]
]
"#;
    let (mut native, _vm) = attach(&nops(10));
    native.wait_for_debug_event().unwrap();
    let source = source_from(debug_info);

    native.set_breakpoint(6).unwrap();
    native.continue_execution().unwrap();
    assert_eq!(
        native.wait_for_debug_event().unwrap(),
        DebugEvent::BreakpointHit { kind: BpType::Software, address: 6 }
    );

    let location = source.variable_location(&mut native, "x").unwrap();
    assert_eq!(location, Some(Location::Offset { reg: "BP".into(), offset: -8 }));

    // Outside the scope the variable does not resolve.
    native.set_register("IP", 2).unwrap();
    assert_eq!(source.variable_location(&mut native, "x").unwrap(), None);
}

#[test]
fn test_inner_scopes_shadow_outer_ones() {
    let (mut native, _vm) = attach(&nops(10));
    native.wait_for_debug_event().unwrap();
    let source = source_from(SCOPED_VARIABLES);

    // Inside the nested scope the inner x wins.
    native.set_register("IP", 6).unwrap();
    let location = source.variable_location(&mut native, "x").unwrap();
    assert_eq!(location, Some(Location::Offset { reg: "BP".into(), offset: -2 }));

    // Outside it the function-level x is visible again.
    native.set_register("IP", 2).unwrap();
    let location = source.variable_location(&mut native, "x").unwrap();
    assert_eq!(location, Some(Location::Offset { reg: "BP".into(), offset: -1 }));

    let names = source.scoped_variables(6);
    assert!(names.contains("x") && names.contains("y"));
}

#[test]
fn test_function_lookup() {
    let source = source_from(
        r#"
.debug_info
compile_unit [
    function id 0 name "main" begin_addr 0 end_addr 4 ;
    function id 1 name "helper" begin_addr 4 end_addr 9 ;
]
"#,
    );
    assert_eq!(source.function_name_by_address(0), Some("main"));
    assert_eq!(source.function_name_by_address(3), Some("main"));
    assert_eq!(source.function_name_by_address(4), Some("helper"));
    assert_eq!(source.function_name_by_address(9), None);

    assert_eq!(source.function_addr_by_name("helper"), Some((4, 9)));
    assert_eq!(source.function_addr_by_name("absent"), None);
}

#[test]
fn test_address_from_string() {
    let source = source_from(
        r#"
.debug_line
1 0
2 2
.debug_info
compile_unit [
    function id 0 name "main" begin_addr 0 end_addr 4 ;
]
"#,
    );
    assert_eq!(source.address_from_string("2").unwrap(), 2);
    assert_eq!(source.address_from_string("main").unwrap(), 0);
    assert!(source.address_from_string("5").is_err());
    assert!(source.address_from_string("absent").is_err());
}

#[test]
fn test_self_referential_types_reconstruct() {
    // A struct holding a pointer to itself terminates and is stable
    // across repeated reconstruction.
    let mut source = source_from(
        r#"
.debug_info
compile_unit [
    structured_type id 0 name "node" size 2 members [ "next" 1 0 , "val" 2 1 ] ;
    pointer_type id 1 type 0 size 1 ;
    primitive_type id 2 name "signed_int" size 1 ;
]
"#,
    );
    let first = source.type_info(0).expect("node reconstructs");
    let second = source.type_info(0).expect("node reconstructs again");
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "node");
    assert_eq!(first.size(), 2);

    let pointer = source.type_info(1).expect("node* reconstructs");
    assert_eq!(pointer.to_string(), "node*");
}

const EVAL_DEBUG_INFO: &str = r#"
.debug_info
compile_unit [
    primitive_type id 0 name "signed_int" size 1 ;
    pointer_type id 1 type 0 size 1 ;
    structured_type id 2 name "node" size 2 members [ "next" 3 0 , "val" 0 1 ] ;
    pointer_type id 3 type 2 size 1 ;
    function id 4 name "main" begin_addr 0 end_addr 4 [
        variable id 5 name "a" type 0 location_expr [ push_address 10 ] ;
        variable id 6 name "p" type 1 location_expr [ push_address 11 ] ;
        variable id 7 name "s" type 2 location_expr [ push_address 12 ] ;
        variable id 8 name "q" type 1 location_expr [ push_address 11 , deref ] ;
    ]
]
"#;

fn eval_session() -> (Native, Source) {
    let (mut native, _vm) = attach(&nops(4));
    native.wait_for_debug_event().unwrap();
    // a = 7 at address 10, p = &a at 11, s = { next: &s, val: 42 } at
    // 12..14.
    native.write_memory(10, &[7, 10, 12, 42]).unwrap();
    (native, source_from(EVAL_DEBUG_INFO))
}

#[test]
fn test_variable_type_information() {
    let (mut native, mut source) = eval_session();
    let ty = source.variable_type_information(&mut native, "p").unwrap().unwrap();
    assert_eq!(ty.to_string(), "int*");
    let ty = source.variable_type_information(&mut native, "s").unwrap().unwrap();
    assert_eq!(ty.to_string(), "node");
    assert!(source.variable_type_information(&mut native, "zzz").unwrap().is_none());
}

#[test]
fn test_location_expression_with_deref() {
    let (mut native, source) = eval_session();
    // q's location program chases the pointer stored at address 11.
    let location = source.variable_location(&mut native, "q").unwrap();
    assert_eq!(location, Some(Location::Address(10)));
}

#[test]
fn test_expression_evaluation() {
    let (mut native, mut source) = eval_session();

    let (value, index) = source.evaluate_expression(&mut native, "a").unwrap();
    assert_eq!(index, 0);
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 7);
    assert_eq!(int.location, Some(Location::Address(10)));

    let (value, index) = source.evaluate_expression(&mut native, "a + 1").unwrap();
    assert_eq!(index, 1);
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 8);

    let (value, _) = source.evaluate_expression(&mut native, "*p").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 7);

    let (value, _) = source.evaluate_expression(&mut native, "s.val").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 42);

    // s.next points back to s; chasing it finds the same val.
    let (value, _) = source.evaluate_expression(&mut native, "s.next->val").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 42);

    // History references.
    let (value, _) = source.evaluate_expression(&mut native, "$1 == 8").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 1);

    assert!(source.evaluate_expression(&mut native, "$99").is_err());
    assert!(source.evaluate_expression(&mut native, "zzz").is_err());
    assert!(source.evaluate_expression(&mut native, "1 +").is_err());
}

#[test]
fn test_pointer_arithmetic_scales_by_element_size() {
    let (mut native, mut source) = eval_session();
    // s is a node*, so q + 1 would move by two words; p is an int*.
    let (value, _) = source.evaluate_expression(&mut native, "*(p + 1)").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    // p + 1 = address 11, which holds the pointer value 10.
    assert_eq!(int.value, 10);

    let (value, _) = source.evaluate_expression(&mut native, "p[2]").unwrap();
    let TypedValue::Integer(int) = &value else { panic!("expected an integer") };
    assert_eq!(int.value, 12);
}

#[test]
fn test_interpreter_rejects_malformed_programs() {
    let (mut native, _vm) = attach(&nops(2));
    native.wait_for_debug_event().unwrap();

    // Stack underflow.
    assert!(LocationInterpreter::interpret(&[LocExpr::Add], &mut native).is_err());
    // A bare register is not addressable.
    assert!(LocationInterpreter::interpret(
        &[LocExpr::PushRegister("R0".into()), LocExpr::Deref],
        &mut native
    )
    .is_err());
    // Leftover stack values.
    assert!(LocationInterpreter::interpret(
        &[LocExpr::PushAddress(1), LocExpr::PushAddress(2)],
        &mut native
    )
    .is_err());
    // Register-relative plus register-relative has no meaning.
    assert!(LocationInterpreter::interpret(
        &[LocExpr::FrameBaseOffset(0), LocExpr::FrameBaseOffset(1), LocExpr::Add],
        &mut native
    )
    .is_err());
    // Empty program.
    assert!(LocationInterpreter::interpret(&[], &mut native).is_err());
}

#[test]
fn test_interpreter_location_algebra() {
    let (mut native, _vm) = attach(&nops(2));
    native.wait_for_debug_event().unwrap();

    let loc = LocationInterpreter::interpret(
        &[LocExpr::PushAddress(4), LocExpr::PushAddress(8), LocExpr::Add],
        &mut native,
    )
    .unwrap();
    assert_eq!(loc, Location::Address(12));

    let loc = LocationInterpreter::interpret(
        &[
            LocExpr::PushRegister("R1".into()),
            LocExpr::PushAddress(3),
            LocExpr::Add,
        ],
        &mut native,
    )
    .unwrap();
    assert_eq!(loc, Location::Offset { reg: "R1".into(), offset: 3 });

    let loc = LocationInterpreter::interpret(
        &[
            LocExpr::PushRegister("R0".into()),
            LocExpr::PushRegister("R1".into()),
            LocExpr::Add,
        ],
        &mut native,
    )
    .unwrap();
    assert_eq!(loc, Location::RegisterSum("R0".into(), "R1".into()));
}

#[test]
fn test_source_lines_are_clamped() {
    let source = source_from(".debug_line\n0 0\n.debug_source\nint main() {\n    return 0;\n}\n");
    assert_eq!(source.line(0), Some("int main() {"));
    assert_eq!(source.lines_range(0, 10).len(), 3);
    assert_eq!(source.lines_range(2, 10), vec!["}"]);
    assert_eq!(source.line(7), None);
}
