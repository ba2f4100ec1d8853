//! End-to-end program runs through the text format.

use chronal_core::{parse_program, ExecError, Machine, Registers, StepOutcome};

#[test]
fn summing_loop_runs_to_halt() {
    // Sums 1..=5 into reg0 with a backward jump through the ip register.
    let text = "\
#ip 5
seti 1 0 1
addr 0 1 0
addi 1 1 1
gtri 1 5 2
addr 2 5 5
seti 0 0 5
";
    let program = parse_program(text).unwrap();
    let mut machine = Machine::new(program).unwrap();
    let regs = machine.run().unwrap();
    assert_eq!(regs.get(0), Ok(15));
    assert_eq!(regs.get(1), Ok(6));
}

#[test]
fn single_seti_example_leaves_ip_register_at_five() {
    let program = parse_program("#ip 0\nseti 5 0 0\n").unwrap();
    let mut machine = Machine::new(program).unwrap();
    assert_eq!(machine.step().unwrap(), StepOutcome::Running);
    // The write is visible in the bound register; the +1 only in the ip.
    assert_eq!(machine.registers().get(0), Ok(5));
    assert_eq!(machine.ip(), 6);
    let regs = machine.run().unwrap();
    assert_eq!(regs.get(0), Ok(5));
}

#[test]
fn supplied_initial_registers_change_the_run() {
    // reg0 picks which of two constants lands in reg2.
    let text = "\
#ip 3
addr 0 3 3
seti 10 0 2
seti 5 0 3
seti 20 0 2
";
    let program = parse_program(text).unwrap();

    let mut machine = Machine::with_registers(
        program.clone(),
        Registers::from_values(vec![0, 0, 0, 0, 0, 0]),
    )
    .unwrap();
    let regs = machine.run().unwrap();
    assert_eq!(regs.get(2), Ok(10));

    let mut machine =
        Machine::with_registers(program, Registers::from_values(vec![2, 0, 0, 0, 0, 0])).unwrap();
    let regs = machine.run().unwrap();
    assert_eq!(regs.get(2), Ok(20));
}

#[test]
fn budget_error_reports_the_ceiling() {
    let program = parse_program("#ip 5\nseti 0 0 0\nseti 0 0 5\n").unwrap();
    let mut machine = Machine::new(program).unwrap();
    match machine.run_with_budget(50) {
        Err(ExecError::BudgetExceeded { budget: 50, .. }) => {}
        other => panic!("expected budget exhaustion, got {other:?}"),
    }
}

#[test]
fn out_of_bounds_destination_aborts_the_run() {
    let program = parse_program("#ip 0\nseti 1 0 9\n").unwrap();
    let mut machine = Machine::new(program).unwrap();
    assert!(matches!(machine.run(), Err(ExecError::Register(_))));
}
