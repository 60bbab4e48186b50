// tests/error_handling.rs
use smips_rust::parser::parse_program;
use smips_rust::{Simulator, SimulatorConfig, SimulatorError};

/// Every failure in the taxonomy is fatal and surfaces as a typed
/// error; structural hazards never do.

fn run_program(config_json: &str, program: &str) -> Result<u64, SimulatorError> {
    let config = SimulatorConfig::from_json_str(config_json)?;
    let instructions = parse_program(program)?;
    let mut simulator = Simulator::new(&config, instructions)?;
    simulator.run()
}

const BASIC_CONFIG: &str = r#"{
    "units": {
        "load": { "number": 1, "latency": 1 },
        "store": { "number": 1, "latency": 1 },
        "alu": { "number": 1, "latency": 1 }
    },
    "registers": { "R2": 4, "R3": 0 },
    "memory": { "size": 4, "init": [3.14, 8, 0, 0] }
}"#;

#[test]
fn test_malformed_configuration_is_rejected() {
    let err = SimulatorConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_unknown_configuration_field_is_rejected() {
    let config = r#"{
        "units": { "load": { "number": 1, "latency": 1, "burst": 4 } },
        "memory": { "size": 1 }
    }"#;
    let err = SimulatorConfig::from_json_str(config).unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_div_latency_is_only_accepted_on_mult() {
    let config = r#"{
        "units": { "add": { "number": 1, "latency": 1, "div_latency": 9 } },
        "memory": { "size": 1 }
    }"#;
    let err = SimulatorConfig::from_json_str(config).unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_memory_init_longer_than_size_is_rejected() {
    let config = r#"{ "memory": { "size": 2, "init": [1, 2, 3] } }"#;
    let err = run_program(config, "DADDIU R1,R0,#1\n").unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_zero_rob_size_is_rejected() {
    let config = r#"{ "rob_size": 0, "memory": { "size": 1 } }"#;
    let err = SimulatorConfig::from_json_str(config).unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_seeding_r0_is_rejected() {
    let config = r#"{ "registers": { "R0": 1 }, "memory": { "size": 1 } }"#;
    let err = run_program(config, "DADDIU R1,R0,#1\n").unwrap_err();
    assert!(matches!(err, SimulatorError::R0Write), "got {:?}", err);
}

#[test]
fn test_seeding_integer_register_with_float_is_rejected() {
    let config = r#"{ "registers": { "R1": 2.5 }, "memory": { "size": 1 } }"#;
    let err = run_program(config, "DADDIU R1,R0,#1\n").unwrap_err();
    assert!(matches!(err, SimulatorError::ConfigError(_)), "got {:?}", err);
}

#[test]
fn test_seeding_unknown_register_is_rejected() {
    let config = r#"{ "registers": { "Q7": 1 }, "memory": { "size": 1 } }"#;
    let err = run_program(config, "DADDIU R1,R0,#1\n").unwrap_err();
    assert!(matches!(err, SimulatorError::InvalidRegister(_)), "got {:?}", err);
}

#[test]
fn test_unknown_mnemonic_aborts_before_simulation() {
    let err = parse_program("FROB R1,R2,R3\n").unwrap_err();
    assert!(
        matches!(err, SimulatorError::ParseError { .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_out_of_range_register_is_rejected() {
    let err = parse_program("DADD R1,R2,R32\n").unwrap_err();
    assert!(matches!(err, SimulatorError::InvalidRegister(_)), "got {:?}", err);
}

#[test]
fn test_misaligned_load_is_fatal() {
    let err = run_program(BASIC_CONFIG, "LD R1,4(R0)\n").unwrap_err();
    assert!(
        matches!(err, SimulatorError::MemoryMisaligned(4)),
        "got {:?}",
        err
    );
}

#[test]
fn test_out_of_bounds_load_is_fatal() {
    let err = run_program(BASIC_CONFIG, "LD R1,800(R0)\n").unwrap_err();
    assert!(
        matches!(err, SimulatorError::MemoryOutOfBounds(800)),
        "got {:?}",
        err
    );
}

#[test]
fn test_negative_address_is_fatal() {
    let err = run_program(BASIC_CONFIG, "LD R1,-8(R0)\n").unwrap_err();
    assert!(
        matches!(err, SimulatorError::MemoryOutOfBounds(-8)),
        "got {:?}",
        err
    );
}

#[test]
fn test_integer_load_from_float_cell_is_fatal() {
    // Cell 0 holds 3.14.
    let err = run_program(BASIC_CONFIG, "LD R1,0(R0)\n").unwrap_err();
    assert!(
        matches!(
            err,
            SimulatorError::TypeMismatch {
                addr: 0,
                expected: "int",
                found: "float"
            }
        ),
        "got {:?}",
        err
    );
}

#[test]
fn test_float_load_from_int_cell_is_fatal() {
    // Cell 1 holds the integer 8.
    let err = run_program(BASIC_CONFIG, "L.D F1,8(R0)\n").unwrap_err();
    assert!(
        matches!(
            err,
            SimulatorError::TypeMismatch {
                addr: 8,
                expected: "float",
                found: "int"
            }
        ),
        "got {:?}",
        err
    );
}

#[test]
fn test_writing_r0_is_fatal_at_commit() {
    let err = run_program(BASIC_CONFIG, "DADDIU R0,R0,#1\n").unwrap_err();
    assert!(matches!(err, SimulatorError::R0Write), "got {:?}", err);
}

#[test]
fn test_integer_division_by_zero_is_fatal() {
    // R3 is seeded to 0.
    let err = run_program(BASIC_CONFIG, "DDIV R1,R2,R3\n").unwrap_err();
    assert!(matches!(err, SimulatorError::DivisionByZero), "got {:?}", err);
}

#[test]
fn test_float_division_by_zero_is_not_an_error() {
    let config = r#"{
        "units": { "mult": { "number": 1, "latency": 1, "div_latency": 2 } },
        "registers": { "F2": 1.0 },
        "memory": { "size": 1 }
    }"#;
    let cycles = run_program(config, "DIV.D F4,F2,F0\n");
    assert!(cycles.is_ok(), "host IEEE semantics apply: {:?}", cycles);
}

#[test]
fn test_runaway_program_hits_the_cycle_limit() {
    let config = r#"{
        "units": { "branch": { "latency": 1, "spec_backward": "taken" } },
        "memory": { "size": 1 }
    }"#;
    let instructions = parse_program("Loop:\nJ Loop\n").expect("program should parse");
    let parsed_config = SimulatorConfig::from_json_str(config).expect("config should parse");
    let mut simulator = Simulator::new(&parsed_config, instructions).expect("build");
    simulator.set_max_cycles(500);

    let err = simulator.run().unwrap_err();
    assert!(
        matches!(err, SimulatorError::CycleLimitExceeded(500)),
        "got {:?}",
        err
    );
}

#[test]
fn test_structural_hazards_are_not_errors() {
    // One ALU and a tiny ROB: plenty of stalling, zero errors.
    let config = r#"{
        "units": { "alu": { "number": 1, "latency": 3 } },
        "rob_size": 2,
        "memory": { "size": 1 }
    }"#;
    let program = "
        DADDIU R1,R0,#1
        DADDIU R2,R0,#2
        DADDIU R3,R0,#3
        DADDIU R4,R0,#4
    ";
    let cycles = run_program(config, program);
    assert!(cycles.is_ok(), "stalls must resolve by re-issuing: {:?}", cycles);
}
