// tests/pipeline.rs
use smips_rust::engine::instruction::{Reg, UnitKind};
use smips_rust::engine::value::Value;
use smips_rust::parser::parse_program;
use smips_rust::{Simulator, SimulatorConfig};

/// Test suite for the speculative pipeline engine: issue, execute,
/// writeback and in-order commit across the reference scenarios.

/// Helper function to build a simulator from a JSON configuration and
/// an assembly source.
fn setup_simulator(config_json: &str, program: &str) -> Simulator {
    let config = SimulatorConfig::from_json_str(config_json).expect("configuration should parse");
    let instructions = parse_program(program).expect("program should parse");
    Simulator::new(&config, instructions).expect("simulator should build")
}

/// Helper function to step until a predicate holds, with a safety cap.
fn step_until<F: Fn(&Simulator) -> bool>(simulator: &mut Simulator, predicate: F) -> bool {
    for _ in 0..10_000 {
        if predicate(simulator) {
            return true;
        }
        if simulator.step().expect("step should not fail") {
            return predicate(simulator);
        }
    }
    false
}

/// Helper function to find the first unit of a given type.
fn unit_state(simulator: &Simulator, kind: UnitKind) -> (Option<u64>, Option<usize>, Option<usize>) {
    let unit = simulator
        .stations
        .units()
        .find(|unit| unit.kind == kind)
        .expect("unit type should exist");
    (unit.time, unit.qj, unit.qk)
}

#[test]
fn test_immediate_load_and_store() {
    // S1: a load feeding a store through F0.
    let config = r#"{
        "units": {
            "load": { "number": 1, "latency": 2 },
            "store": { "number": 1, "latency": 1 }
        },
        "memory": { "size": 4, "init": [3.14, 0, 0, 0] }
    }"#;
    let program = "L.D F0,0(R0)\nS.D F0,16(R0)\n";

    let mut simulator = setup_simulator(config, program);
    simulator.run().expect("simulation should complete");

    assert_eq!(
        simulator.memory.data[0],
        Value::Float(3.14),
        "memory[0] should keep its initial value"
    );
    assert_eq!(
        simulator.memory.data[2],
        Value::Float(3.14),
        "the store should land in memory[2] (byte address 16)"
    );
    assert_eq!(simulator.regs.get(Reg::F(0)), Value::Float(3.14));
    assert_eq!(simulator.instructions_committed, 2);
}

#[test]
fn test_raw_dependency_through_rob() {
    // S2: ADD.D waits on a load still in flight and catches its value
    // from the CDB broadcast.
    let config = r#"{
        "units": {
            "load": { "number": 1, "latency": 2 },
            "add": { "number": 1, "latency": 2 }
        },
        "memory": { "size": 2, "init": [1.0, 2.0] }
    }"#;
    let program = "L.D F0,0(R0)\nL.D F2,8(R0)\nADD.D F4,F0,F2\n";

    let mut simulator = setup_simulator(config, program);

    // Step until the add has been issued.
    let issued = step_until(&mut simulator, |sim| {
        sim.stations
            .units()
            .any(|unit| unit.kind == UnitKind::Add && unit.busy)
    });
    assert!(issued, "the add should issue");

    // The add must be waiting on the second load through the ROB.
    let (time, _, qk) = unit_state(&simulator, UnitKind::Add);
    assert!(qk.is_some(), "the add should wait on the in-flight load");
    assert!(time.is_none(), "a waiting unit must not be counting down");

    // The broadcast populates the operand and execution proceeds.
    let captured = step_until(&mut simulator, |sim| {
        sim.stations
            .units()
            .any(|unit| unit.kind == UnitKind::Add && unit.busy && unit.qk.is_none())
    });
    assert!(captured, "the CDB broadcast should fill vk");

    simulator.run().expect("simulation should complete");
    assert_eq!(simulator.regs.get(Reg::F(0)), Value::Float(1.0));
    assert_eq!(simulator.regs.get(Reg::F(2)), Value::Float(2.0));
    assert_eq!(simulator.regs.get(Reg::F(4)), Value::Float(3.0));
}

#[test]
fn test_raw_with_both_operands_in_flight() {
    // Two load units keep both producers in flight so the add issues
    // with qj and qk pointing at the ROB.
    let config = r#"{
        "units": {
            "load": { "number": 2, "latency": 4 },
            "add": { "number": 1, "latency": 2 }
        },
        "memory": { "size": 2, "init": [1.0, 2.0] }
    }"#;
    let program = "L.D F0,0(R0)\nL.D F2,8(R0)\nADD.D F4,F0,F2\n";

    let mut simulator = setup_simulator(config, program);
    let issued = step_until(&mut simulator, |sim| {
        sim.stations
            .units()
            .any(|unit| unit.kind == UnitKind::Add && unit.busy)
    });
    assert!(issued, "the add should issue");

    let (_, qj, qk) = unit_state(&simulator, UnitKind::Add);
    assert!(
        qj.is_some() && qk.is_some(),
        "both operands should wait on in-flight loads, got qj={:?} qk={:?}",
        qj,
        qk
    );

    simulator.run().expect("simulation should complete");
    assert_eq!(simulator.regs.get(Reg::F(4)), Value::Float(3.0));
}

#[test]
fn test_correctly_predicted_backward_branch() {
    // S3: a countdown loop with the backward direction predicted
    // taken. Every back edge is predicted correctly; only the final
    // fall-through mispredicts.
    let config = r#"{
        "units": {
            "alu": { "number": 1, "latency": 1 },
            "branch": { "latency": 1, "spec_backward": "taken" }
        },
        "memory": { "size": 1 }
    }"#;
    let program = "
        DADDIU R1,R0,#3
    Loop:
        DADDIU R1,R1,#-1
        BNEZ R1,Loop
    ";

    let mut simulator = setup_simulator(config, program);
    simulator.run().expect("simulation should complete");

    assert_eq!(simulator.regs.get(Reg::R(1)), Value::Int(0));
    assert_eq!(
        simulator.branch_mispredictions, 1,
        "only the loop exit should mispredict"
    );
}

#[test]
fn test_mispredicted_forward_branch_flushes_speculation() {
    // S4: a forward branch predicted not-taken that is actually taken.
    // The wrong-path instructions must leave no architectural trace,
    // and the flush must leave the engine empty.
    let config = r#"{
        "units": {
            "alu": { "number": 2, "latency": 1 },
            "branch": { "latency": 1, "spec_forward": "not_taken" }
        },
        "memory": { "size": 1 }
    }"#;
    let program = "
        DADDIU R1,R0,#5
        DADDIU R2,R0,#5
        BEQ R1,R2,End
        DADDIU R3,R0,#99
        DADDIU R3,R3,#1
    End:
    ";

    let mut simulator = setup_simulator(config, program);
    simulator.run().expect("simulation should complete");

    assert_eq!(simulator.branch_mispredictions, 1);
    assert_eq!(
        simulator.regs.get(Reg::R(3)),
        Value::Int(0),
        "wrong-path instructions must not commit"
    );
    assert_eq!(simulator.regs.get(Reg::R(1)), Value::Int(5));
    assert_eq!(simulator.regs.get(Reg::R(2)), Value::Int(5));

    // Reset-after-misprediction law: the branch targeted the end of
    // the program, so nothing issued after the flush.
    assert!(simulator.rob.is_empty(), "the ROB should be flushed");
    assert_eq!(
        simulator.regs.pending_writers(),
        0,
        "the rename table should be cleared"
    );
    assert!(
        simulator.stations.units().all(|unit| !unit.busy),
        "all functional units should be idle"
    );
    assert_eq!(simulator.pc, 5, "the PC should sit at the corrected target");
}

#[test]
fn test_division_latency_selection() {
    // S5: DIV.D starts counting from div_latency, MUL.D from latency.
    let config = r#"{
        "units": {
            "mult": { "number": 1, "latency": 4, "div_latency": 10 }
        },
        "registers": { "F0": 2.0, "F2": 8.0 },
        "memory": { "size": 1 }
    }"#;

    let mut divider = setup_simulator(config, "DIV.D F4,F2,F0\n");
    divider.step().expect("step should not fail");
    let (time, _, _) = unit_state(&divider, UnitKind::Mult);
    assert_eq!(time, Some(10), "division should use div_latency");

    let mut multiplier = setup_simulator(config, "MUL.D F4,F2,F0\n");
    multiplier.step().expect("step should not fail");
    let (time, _, _) = unit_state(&multiplier, UnitKind::Mult);
    assert_eq!(time, Some(4), "multiplication should use latency");

    divider.run().expect("simulation should complete");
    assert_eq!(divider.regs.get(Reg::F(4)), Value::Float(4.0));
    multiplier.run().expect("simulation should complete");
    assert_eq!(multiplier.regs.get(Reg::F(4)), Value::Float(16.0));
}

#[test]
fn test_structural_stall_on_tiny_rob() {
    // S6: three independent adds against a two-entry ROB and a single
    // add unit. The third add cannot issue before the first commits,
    // and the PC is re-asserted on every stalled cycle.
    let config = r#"{
        "units": {
            "add": { "number": 1, "latency": 2 }
        },
        "rob_size": 2,
        "registers": { "F0": 1.5 },
        "memory": { "size": 1 }
    }"#;
    let program = "ADD.D F2,F0,F0\nADD.D F4,F0,F0\nADD.D F6,F0,F0\n";

    let mut simulator = setup_simulator(config, program);

    let mut first_commit_clock = None;
    let mut third_issue_clock = None;
    let mut stalled_ticks_at_two = 0;
    let mut saw_full_rename_window = false;
    loop {
        let finished = simulator.step().expect("step should not fail");
        if first_commit_clock.is_none() && simulator.instructions_committed >= 1 {
            first_commit_clock = Some(simulator.clock);
        }
        if third_issue_clock.is_none() && simulator.instructions_issued == 3 {
            third_issue_clock = Some(simulator.clock);
        }
        if simulator.pc == 2 && simulator.instructions_issued < 3 {
            stalled_ticks_at_two += 1;
        }
        if simulator.rob.len() == 2 && simulator.regs.pending_writers() == 2 {
            saw_full_rename_window = true;
        }
        if finished {
            break;
        }
        assert!(simulator.clock < 1_000, "simulation should terminate");
    }

    let first_commit = first_commit_clock.expect("the first add should commit");
    let third_issue = third_issue_clock.expect("the third add should issue");
    assert!(
        third_issue >= first_commit,
        "the third add (clock {}) must wait for the first commit (clock {})",
        third_issue,
        first_commit
    );
    assert!(
        stalled_ticks_at_two >= 2,
        "the PC should be re-asserted across stall cycles"
    );
    assert!(
        saw_full_rename_window,
        "two rename entries should be in flight while the ROB is full"
    );

    for reg in [Reg::F(2), Reg::F(4), Reg::F(6)] {
        assert_eq!(simulator.regs.get(reg), Value::Float(3.0));
    }
}

#[test]
fn test_commits_preserve_program_order() {
    // Out-of-order completion, in-order commit: a slow multiply ahead
    // of a fast add must commit first.
    let config = r#"{
        "units": {
            "mult": { "number": 1, "latency": 8 },
            "alu": { "number": 1, "latency": 1 }
        },
        "registers": { "F0": 2.0, "F2": 3.0 },
        "memory": { "size": 1 }
    }"#;
    let program = "MUL.D F4,F2,F0\nDADDIU R1,R0,#7\n";

    let mut simulator = setup_simulator(config, program);

    // The ALU result is written back long before the multiply, but R1
    // must stay architecturally unwritten until the multiply commits.
    let alu_done = step_until(&mut simulator, |sim| {
        sim.rob
            .iter()
            .any(|entry| entry.dest == Some(Reg::R(1)) && entry.ready)
    });
    assert!(alu_done, "the add should write back early");
    assert_eq!(
        simulator.instructions_committed, 0,
        "nothing can commit while the multiply is at the ROB head"
    );
    assert_eq!(simulator.regs.get(Reg::R(1)), Value::Int(0));

    simulator.run().expect("simulation should complete");
    assert_eq!(simulator.regs.get(Reg::F(4)), Value::Float(6.0));
    assert_eq!(simulator.regs.get(Reg::R(1)), Value::Int(7));
}

#[test]
fn test_rename_table_tracks_latest_writer() {
    // WAW through the ROB: two writes to F2 in flight; readers must
    // see the newest one and the rename table must point at it.
    let config = r#"{
        "units": {
            "add": { "number": 2, "latency": 6 },
            "store": { "number": 1, "latency": 1 }
        },
        "registers": { "F0": 1.0, "F4": 10.0 },
        "memory": { "size": 2 }
    }"#;
    let program = "ADD.D F2,F0,F0\nADD.D F2,F4,F4\nS.D F2,0(R0)\n";

    let mut simulator = setup_simulator(config, program);
    let all_issued = step_until(&mut simulator, |sim| sim.instructions_issued == 3);
    assert!(all_issued, "all three instructions should issue");

    // The rename table must point at the second add's slot.
    let stat = simulator.regs.stat(Reg::F(2)).expect("F2 should be renamed");
    let latest = simulator
        .rob
        .iter()
        .filter(|entry| entry.dest == Some(Reg::F(2)))
        .last()
        .expect("an in-flight writer of F2 should exist");
    assert_eq!(stat, latest.index);

    simulator.run().expect("simulation should complete");
    assert_eq!(
        simulator.memory.data[0],
        Value::Float(20.0),
        "the store must observe the newest F2"
    );
    assert_eq!(simulator.regs.get(Reg::F(2)), Value::Float(20.0));
}
