use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SimulatorError {
    // Front-end errors
    ParseError { line: usize, message: String },
    ConfigError(String),

    // Register errors
    InvalidRegister(String),
    R0Write,

    // Memory errors
    MemoryOutOfBounds(i64),
    MemoryMisaligned(i64),
    TypeMismatch {
        addr: i64,
        expected: &'static str,
        found: &'static str,
    },

    // Execution errors
    UnknownOperator(char),
    UnknownBranch(String),
    DivisionByZero,
    CycleLimitExceeded(u64),

    // System errors
    IoError(std::io::Error),
}

impl SimulatorError {
    /// Process exit code for the driver: 1 for anything the simulator
    /// detected itself, 2 for failures outside its control.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulatorError::IoError(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::ParseError { line, message } => {
                write!(f, "Parse error at line {}: {}", line, message)
            },
            SimulatorError::ConfigError(message) => {
                write!(f, "Configuration error: {}", message)
            },
            SimulatorError::InvalidRegister(name) => {
                write!(f, "Access to an invalid register: {}", name)
            },
            SimulatorError::R0Write => {
                write!(f, "Cannot write to R0, this register is a constant")
            },
            SimulatorError::MemoryOutOfBounds(addr) => {
                write!(f, "Memory access out of bounds: {}", addr)
            },
            SimulatorError::MemoryMisaligned(addr) => {
                write!(
                    f,
                    "Misaligned memory access: {} (must be a multiple of 8)",
                    addr
                )
            },
            SimulatorError::TypeMismatch {
                addr,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Type mismatch at memory address {}: expected {}, cell holds {}",
                    addr, expected, found
                )
            },
            SimulatorError::UnknownOperator(op) => write!(f, "Unknown operator: {}", op),
            SimulatorError::UnknownBranch(code) => {
                write!(f, "Unknown branch instruction: {}", code)
            },
            SimulatorError::DivisionByZero => write!(f, "Division by zero"),
            SimulatorError::CycleLimitExceeded(limit) => {
                write!(f, "Simulation exceeded the cycle limit of {}", limit)
            },
            SimulatorError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SimulatorError {}

impl From<std::io::Error> for SimulatorError {
    fn from(error: std::io::Error) -> Self {
        SimulatorError::IoError(error)
    }
}
