//! Outer run-mode state machine (§4.11). The tick loop in [`crate::system`]
//! only knows how to advance one CPU cycle and report whether a breakpoint
//! or watchpoint fired; this module decides what a user-facing debugger
//! action ("step", "step over", "run to return", ...) means in terms of
//! that primitive, and when control should fall back to an idle, UI-driven
//! `DEBUG` state.

use beastem_core::core::machine::Machine;

use crate::instructions;
use crate::system::Beast;

/// Reserved slot in `DebugManager`'s system-breakpoint table used by OVER's
/// synthetic "stop after this call returns" breakpoint.
const SYSTEM_BP_STEP_OVER: usize = 0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunMode {
    /// Tick freely until a breakpoint, watchpoint, or host close.
    Run,
    /// Execute exactly one instruction, then drop to `Debug`.
    Step,
    /// Step over a `CALL`; runs until the call returns (or degrades to
    /// `Step` if the current instruction isn't a call at all).
    Over,
    /// Run until the current function returns (call-depth goes negative).
    Out,
    /// Resolve a conditional branch: same mechanics as `Step`, named
    /// separately because the UI invokes it specifically on a branch
    /// instruction to see which way it goes.
    Take,
    /// Paused; the debugger UI drives breakpoint/watchpoint/register views.
    Debug,
    /// Paused; the file-load dialog (`-f`/`-l`/video-asset equivalents) is active.
    Files,
    Breakpoints,
    Watchpoints,
    /// Terminate the host loop.
    Quit,
}

pub struct RunModeController {
    mode: RunMode,
    call_depth: i32,
}

impl Default for RunModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunModeController {
    pub fn new() -> Self {
        Self { mode: RunMode::Debug, call_depth: 0 }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Switch modes, performing whatever setup the target mode needs
    /// (placing a system breakpoint for OVER, resetting the call-depth
    /// counter for OUT).
    pub fn set_mode(&mut self, mode: RunMode, beast: &mut Beast) {
        beast.debug.clear_system_breakpoint(SYSTEM_BP_STEP_OVER);
        match mode {
            RunMode::Over => self.enter_over(beast),
            RunMode::Out => {
                self.call_depth = 0;
                self.mode = RunMode::Out;
            }
            other => self.mode = other,
        }
    }

    fn enter_over(&mut self, beast: &mut Beast) {
        let pc = beast.cpu.pc;
        let op1 = beast.memory.peek(pc);
        let op2 = beast.memory.peek(pc.wrapping_add(1));

        if instructions::is_jump_or_return(op1, op2) || instructions::is_conditional(op1, op2) {
            // Jump/return/conditional branch: "stepping over" it is
            // meaningless (nothing to run to completion, and a taken branch
            // would never reach PC+len), so just step it.
            self.mode = RunMode::Step;
            return;
        }

        let length = instructions::instruction_length(op1, op2);
        let target = pc.wrapping_add(length as u16);
        beast.debug.set_system_breakpoint(SYSTEM_BP_STEP_OVER, target as u32, false);
        self.mode = RunMode::Over;
    }

    /// Drive one video frame's worth of work for the current mode. Only
    /// `Run` is frame-chunked (so host events stay responsive); the
    /// step/over/out/take modes complete a single debugger action to
    /// completion within this call and drop back to `Debug`, matching the
    /// original front panel's blocking single-step behaviour.
    pub fn drive_frame(&mut self, beast: &mut Beast) {
        match self.mode {
            RunMode::Run => {
                beast.run_frame();
                if beast.stopped {
                    self.mode = RunMode::Debug;
                }
            }
            RunMode::Step | RunMode::Take => self.step(beast),
            RunMode::Over => self.step_over(beast),
            RunMode::Out => self.step_out(beast),
            RunMode::Debug
            | RunMode::Files
            | RunMode::Breakpoints
            | RunMode::Watchpoints
            | RunMode::Quit => {}
        }
    }

    /// Runs until the Z80 reports an instruction boundary. Used by `Step`
    /// and `Take` alike: the original hardware's TAKE mode continues until
    /// a matching conditional branch resolves one way or the other, which
    /// for a single invocation is exactly one retired instruction.
    fn step(&mut self, beast: &mut Beast) {
        beast.tick();
        while !beast.at_instruction_boundary() {
            beast.tick();
        }
        self.mode = RunMode::Debug;
    }

    fn step_over(&mut self, beast: &mut Beast) {
        loop {
            beast.tick();
            if beast.stopped {
                break;
            }
        }
        beast.debug.clear_system_breakpoint(SYSTEM_BP_STEP_OVER);
        self.mode = RunMode::Debug;
    }

    fn step_out(&mut self, beast: &mut Beast) {
        loop {
            let at_boundary = beast.at_instruction_boundary();
            let pc = beast.cpu.pc;
            let op1 = beast.memory.peek(pc);
            let op2 = beast.memory.peek(pc.wrapping_add(1));

            beast.tick();

            if at_boundary {
                if let Some(direction) = instructions::flow_direction(op1, op2) {
                    self.call_depth += direction as i32;
                }
            }

            if self.call_depth < 0 && beast.at_instruction_boundary() {
                break;
            }
        }
        self.mode = RunMode::Debug;
    }
}
