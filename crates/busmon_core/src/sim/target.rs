use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use busmon_common::{BUS_SIZE, CMD_ARG, COMMAND};

use crate::Command;

const ESC: u8 = 0x1B;

/// What the target does after running up to its next `WAI`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TargetStep {
    /// A command sits in the mailbox and RDY is pulled low.
    Request,
    /// The program stopped (STP); it will not request again.
    Halt,
}

/// Mailbox behaviour of a program running on the target.
pub trait TargetProgram {
    /// The target left reset.
    fn start(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep;
    /// The target was woken after its request was serviced.
    fn resume(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep;
}

fn request(memory: &mut [u8; BUS_SIZE], command: Command) -> TargetStep {
    memory[COMMAND as usize] = command as u8;
    TargetStep::Request
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
enum EchoState {
    #[default]
    Getch,
    Putch,
    Exit,
}

/// Reads characters and writes them back until ESC, then exits.
#[derive(Debug, Default)]
pub struct EchoProgram {
    state: EchoState,
}

impl TargetProgram for EchoProgram {
    fn start(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        self.state = EchoState::Getch;
        request(memory, Command::Getch)
    }

    fn resume(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        match self.state {
            EchoState::Getch => {
                let c = memory[CMD_ARG as usize];
                if c == ESC {
                    self.state = EchoState::Exit;
                    request(memory, Command::Exit)
                } else {
                    self.state = EchoState::Putch;
                    request(memory, Command::Putch)
                }
            }
            EchoState::Putch => {
                self.state = EchoState::Getch;
                request(memory, Command::Getch)
            }
            EchoState::Exit => TargetStep::Halt,
        }
    }
}

/// Prints the time once and exits.
#[derive(Debug, Default)]
pub struct ClockProgram {
    printed: bool,
}

impl TargetProgram for ClockProgram {
    fn start(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        self.printed = false;
        request(memory, Command::PrTime)
    }

    fn resume(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        if self.printed {
            return TargetStep::Halt;
        }
        self.printed = true;
        request(memory, Command::Exit)
    }
}

/// Mailbox contents (`CMD_ARG..CMD_ARG + 4`) seen by a [`ScriptProgram`]
/// after each serviced request.
pub type Transcript = Rc<RefCell<Vec<[u8; 4]>>>;

/// Issues a fixed list of raw command codes, each with an argument byte.
pub struct ScriptProgram {
    steps: Vec<(u8, u8)>,
    pending: VecDeque<(u8, u8)>,
    transcript: Transcript,
}

impl ScriptProgram {
    pub fn new(steps: &[(u8, u8)]) -> (Self, Transcript) {
        let transcript = Transcript::default();
        let program = Self {
            steps: steps.to_vec(),
            pending: VecDeque::new(),
            transcript: Rc::clone(&transcript),
        };
        (program, transcript)
    }

    fn next(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        match self.pending.pop_front() {
            Some((command, arg)) => {
                memory[COMMAND as usize] = command;
                memory[CMD_ARG as usize] = arg;
                TargetStep::Request
            }
            None => TargetStep::Halt,
        }
    }
}

impl TargetProgram for ScriptProgram {
    fn start(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        self.pending = self.steps.iter().copied().collect();
        self.transcript.borrow_mut().clear();
        self.next(memory)
    }

    fn resume(&mut self, memory: &mut [u8; BUS_SIZE]) -> TargetStep {
        let arg = CMD_ARG as usize;
        let mut result = [0; 4];
        result.copy_from_slice(&memory[arg..arg + 4]);
        self.transcript.borrow_mut().push(result);
        self.next(memory)
    }
}
