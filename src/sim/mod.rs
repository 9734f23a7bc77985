//! Phase-driven abstract interpreter
//!
//! `Simulator` steps through one decoded method under an external driver.
//! Each instruction is executed as three phase calls in strict order,
//! `perform_pops` then `perform_pushes` then `perform_jump`, preceded once
//! by `init_locals`; calling a phase out of turn is a contract violation.
//! Any failure inside a phase transitions to `Errored` with a captured
//! message and leaves the stack and locals exactly as they were before the
//! call, so a stepping caller can always fall back to an earlier snapshot.
//!
//! Snapshots are plain clones: the instruction list, effect table and
//! lineage arena are shared, so a clone costs stack depth plus locals
//! count.

use std::rc::Rc;

use log::debug;

use crate::decode::{Insn, Label, MethodCode, TryRegion};
use crate::effect::{EffectEntry, EffectTable, PopReq};
use crate::error::{Error, Result};
use crate::value::{Category, LineageStore, Value};

pub mod fold;
pub mod locals;
pub mod stack;

pub use locals::LocalsArray;
pub use stack::OperandStack;

/// Where the simulation currently is; the phase names the call that must
/// come next. `Finished` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Init,
    Pop,
    Push,
    Jump,
    Finished,
    Errored,
}

impl std::fmt::Display for SimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SimState::Init => "init",
            SimState::Pop => "pop",
            SimState::Push => "push",
            SimState::Jump => "jump",
            SimState::Finished => "finished",
            SimState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Statically resolved outcome of the current instruction's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    /// The branch will be taken to this label.
    Target(Label),
    /// Execution falls through to the next instruction.
    FallThrough,
    /// An operand's literal is unknown; the caller must choose.
    Undetermined,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    method: Rc<MethodCode>,
    effects: Rc<EffectTable>,
    lineage: LineageStore,
    stack: OperandStack,
    locals: LocalsArray,
    /// Values popped for the current instruction, topmost first.
    popped: Vec<Value>,
    pc: usize,
    state: SimState,
    error: Option<String>,
}

impl Simulator {
    pub fn new(method: MethodCode) -> Result<Simulator> {
        let effects = EffectTable::build(&method)?;
        let lineage = LineageStore::new();
        let stack = OperandStack::new(method.max_stack);
        let locals = LocalsArray::new(
            method.max_locals,
            Value::new(Category::Empty, lineage.argument()),
        );
        Ok(Simulator {
            method: Rc::new(method),
            effects: Rc::new(effects),
            lineage,
            stack,
            locals,
            popped: Vec::new(),
            pc: 0,
            state: SimState::Init,
            error: None,
        })
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Message captured when the simulation errored.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Index of the current instruction.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn method(&self) -> &MethodCode {
        &self.method
    }

    pub fn current_instruction(&self) -> Option<&Insn> {
        self.method.instructions.get(self.pc)
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn locals(&self) -> &LocalsArray {
        &self.locals
    }

    /// Provenance arena shared by every value in this simulation.
    pub fn lineage(&self) -> &LineageStore {
        &self.lineage
    }

    /// Values popped by the current instruction, topmost first.
    pub fn pending_pops(&self) -> &[Value] {
        &self.popped
    }

    fn entry(&self) -> &EffectEntry {
        self.effects.entry(self.pc)
    }

    fn ensure_state(&self, want: SimState) -> Result<()> {
        if self.state == want {
            Ok(())
        } else {
            Err(Error::ContractViolation {
                expected: format!("phase {want}"),
                found: self.state.to_string(),
            })
        }
    }

    /// Mark the simulation errored and pass the failure through.
    fn commit(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            debug!("simulation errored at {}: {e}", self.pc);
            self.state = SimState::Errored;
            self.error = Some(e.to_string());
        }
        result
    }

    /// Seed the locals from the method descriptor: an implicit reference
    /// receiver for instance methods, then the declared arguments left to
    /// right, wide arguments taking two slots.
    pub fn init_locals(&mut self) -> Result<()> {
        let r = self.ensure_state(SimState::Init).and_then(|_| {
            let method = Rc::clone(&self.method);
            let (args, _) = crate::decode::descriptor::method_categories(&method.descriptor)?;
            let mut slot = 0;
            if !method.is_static {
                self.locals
                    .store(slot, Value::new(Category::Reference, self.lineage.argument()))?;
                slot += 1;
            }
            for category in args {
                self.locals
                    .store(slot, Value::new(category, self.lineage.argument()))?;
                slot += category.width();
            }
            debug!("locals initialized for {} ({slot} argument slots)", method.descriptor);
            self.state = if method.is_empty() { SimState::Finished } else { SimState::Pop };
            Ok(())
        });
        self.commit(r)
    }

    /// Apply every pop requirement of the current instruction, retaining
    /// the popped values for the push phase and for branch prediction.
    pub fn perform_pops(&mut self) -> Result<()> {
        let r = self.ensure_state(SimState::Pop).and_then(|_| {
            let effects = Rc::clone(&self.effects);
            let entry = effects.entry(self.pc);
            let mut stack = self.stack.clone();
            let mut popped = Vec::new();
            for req in &entry.pops {
                match req {
                    PopReq::Cat(category) => popped.push(stack.pop(*category)?),
                    PopReq::Any1 => popped.push(stack.pop_any1()?),
                    PopReq::Any2 => popped.extend(stack.pop_any2()?),
                    PopReq::RefOrRetAddr => popped.push(stack.pop_ref_or_ret()?),
                }
            }
            self.stack = stack;
            self.popped = popped;
            self.state = SimState::Push;
            Ok(())
        });
        self.commit(r)
    }

    /// Apply the current instruction's pushes, known-value folding, and
    /// local-variable side effects.
    pub fn perform_pushes(&mut self) -> Result<()> {
        let r = self.ensure_state(SimState::Push).and_then(|_| {
            let method = Rc::clone(&self.method);
            let effects = Rc::clone(&self.effects);
            let insn = &method.instructions[self.pc];
            let entry = effects.entry(self.pc);
            let mut stack = self.stack.clone();
            let mut locals = self.locals.clone();

            if entry.is_frame_reset {
                self.apply_frame(insn, &mut stack, &mut locals)?;
            } else if entry.clears_stack {
                stack.clear();
            } else if entry.is_shuffle {
                self.apply_shuffle(insn, &mut stack)?;
            } else {
                self.apply_pushes(insn, entry, &mut stack)?;
                self.apply_local_effects(insn, &mut locals)?;
            }

            debug!("pushed at {}: {insn}", self.pc);
            self.stack = stack;
            self.locals = locals;
            self.state = SimState::Jump;
            Ok(())
        });
        self.commit(r)
    }

    fn apply_pushes(&self, insn: &Insn, entry: &EffectEntry, stack: &mut OperandStack) -> Result<()> {
        // Loads move the stored value, extending its lineage rather than
        // starting a fresh one.
        let loaded = match insn {
            Insn::Iload(n) => Some(self.locals.load(*n as usize, Category::Int)?),
            Insn::Lload(n) => Some(self.locals.load(*n as usize, Category::Long)?),
            Insn::Fload(n) => Some(self.locals.load(*n as usize, Category::Float)?),
            Insn::Dload(n) => Some(self.locals.load(*n as usize, Category::Double)?),
            Insn::Aload(n) => Some(self.locals.load(*n as usize, Category::Reference)?),
            _ => None,
        };
        if let Some(value) = loaded {
            return stack.push(self.lineage.move_value(&value, self.pc));
        }

        for category in &entry.pushes {
            let operands: Vec<&Value> = self.popped.iter().collect();
            let mut value = self.lineage.fresh(*category, self.pc, &operands);
            let known = fold::const_known(insn)
                .or_else(|| fold::folded_known(insn, &self.popped));
            if let Some(known) = known {
                value = value.with_known(known);
            }
            stack.push(value)?;
        }
        Ok(())
    }

    fn apply_local_effects(&self, insn: &Insn, locals: &mut LocalsArray) -> Result<()> {
        match insn {
            Insn::Istore(n) | Insn::Lstore(n) | Insn::Fstore(n) | Insn::Dstore(n)
            | Insn::Astore(n) => {
                locals.store(*n as usize, self.lineage.move_value(&self.popped[0], self.pc))
            }
            Insn::Iinc { var, delta } => {
                let old = self.locals.load(*var as usize, Category::Int)?;
                let moved = self.lineage.move_value(&old, self.pc);
                let mut value = Value::new(Category::Int, moved.lineage);
                if let Some(known) = fold::incremented_known(old.known.as_deref(), *delta) {
                    value = value.with_known(known);
                }
                locals.store(*var as usize, value)
            }
            // A subroutine return only reads its local; validate it here.
            Insn::Ret(n) => {
                self.locals.load(*n as usize, Category::ReturnAddress)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Group the popped values back into the logical units the pop
    /// requirements produced, top unit first, each unit topmost first.
    fn popped_units(&self) -> Vec<Vec<Value>> {
        let mut units = Vec::new();
        let mut i = 0;
        for req in &self.entry().pops {
            match req {
                PopReq::Any2 if self.popped[i].width() == 1 => {
                    units.push(vec![self.popped[i].clone(), self.popped[i + 1].clone()]);
                    i += 2;
                }
                _ => {
                    units.push(vec![self.popped[i].clone()]);
                    i += 1;
                }
            }
        }
        units
    }

    /// Re-push one unit, bottom value first. When `moved` the copies carry
    /// a move record for this instruction.
    fn push_unit(&self, stack: &mut OperandStack, unit: &[Value], moved: bool) -> Result<()> {
        for value in unit.iter().rev() {
            let value = if moved {
                self.lineage.move_value(value, self.pc)
            } else {
                value.clone()
            };
            stack.push(value)?;
        }
        Ok(())
    }

    /// Stack shuffles resolve from the identities of the popped values:
    /// duplicates insert a moved copy, swap reorders without touching
    /// lineage.
    fn apply_shuffle(&self, insn: &Insn, stack: &mut OperandStack) -> Result<()> {
        let units = self.popped_units();
        match insn {
            Insn::Dup | Insn::Dup2 => {
                self.push_unit(stack, &units[0], false)?;
                self.push_unit(stack, &units[0], true)
            }
            Insn::DupX1 | Insn::DupX2 | Insn::Dup2X1 | Insn::Dup2X2 => {
                self.push_unit(stack, &units[0], true)?;
                self.push_unit(stack, &units[1], false)?;
                self.push_unit(stack, &units[0], false)
            }
            Insn::Swap => {
                self.push_unit(stack, &units[0], false)?;
                self.push_unit(stack, &units[1], false)
            }
            _ => Err(Error::UnsupportedOpcode { mnemonic: insn.mnemonic().to_owned() }),
        }
    }

    /// A full stack-map frame verifies the declared locals against the
    /// simulated ones and resets the state to the declared shape. A
    /// declared slot whose simulated category differs fails the
    /// simulation; verified slots keep their value and provenance, slots
    /// past the declaration are cleared, and the declared stack is
    /// re-materialized here.
    fn apply_frame(&self, insn: &Insn, stack: &mut OperandStack, locals: &mut LocalsArray) -> Result<()> {
        let (decl_locals, decl_stack) = match insn {
            Insn::Frame { locals, stack } => (locals, stack),
            _ => return Err(Error::UnsupportedOpcode { mnemonic: insn.mnemonic().to_owned() }),
        };

        let mut fresh = LocalsArray::new(
            self.locals.len(),
            Value::new(Category::Empty, self.lineage.argument()),
        );
        let mut slot = 0;
        for decl in decl_locals {
            let category = decl.category();
            fresh.store(slot, self.locals.load(slot, category)?)?;
            slot += category.width();
        }
        *locals = fresh;

        stack.clear();
        for decl in decl_stack {
            stack.push(Value::new(decl.category(), self.lineage.origin(self.pc)))?;
        }
        Ok(())
    }

    /// Advance control flow. `None` falls through sequentially (finishing
    /// at the end of the stream or after a return or throw); `Some(label)`
    /// repositions to that label.
    pub fn perform_jump(&mut self, target: Option<Label>) -> Result<()> {
        let r = self.ensure_state(SimState::Jump).and_then(|_| {
            let entry = self.effects.entry(self.pc);
            match target {
                Some(label) => {
                    let index = self.method.label_index(label).ok_or(
                        Error::InvalidJumpTarget { label: label.to_string() },
                    )?;
                    debug!("jump from {} to {label} ({index})", self.pc);
                    self.pc = index;
                    self.state = SimState::Pop;
                    Ok(())
                }
                None if entry.is_ret => Err(Error::ContractViolation {
                    expected: "an explicit subroutine return target".into(),
                    found: "no target".into(),
                }),
                None if entry.is_return || entry.is_throw => {
                    self.state = SimState::Finished;
                    Ok(())
                }
                None => {
                    self.pc += 1;
                    self.state = if self.pc >= self.method.len() {
                        SimState::Finished
                    } else {
                        SimState::Pop
                    };
                    Ok(())
                }
            }
        });
        self.commit(r)
    }

    /// Transfer control from a modeled throw to the matching handler: scan
    /// the active regions innermost first, take the first whose declared
    /// type matches (a region with no declared type catches everything),
    /// and enter its handler with the re-materialized exception as the only
    /// stack value. With no matching region the exception leaves the method
    /// and the simulation finishes.
    pub fn jump_to_catch(&mut self, exception: Option<&str>) -> Result<()> {
        let r = self.ensure_state(SimState::Jump).and_then(|_| {
            let regions = self.active_catches();
            let chosen = regions.iter().rev().find(|r| match (&r.catch_type, exception) {
                (None, _) => true,
                (Some(t), Some(e)) => t == e,
                (Some(_), None) => false,
            });
            let Some(region) = chosen else {
                debug!("throw at {} leaves the method", self.pc);
                self.state = SimState::Finished;
                return Ok(());
            };
            let index = self.method.label_index(region.handler).ok_or(
                Error::InvalidJumpTarget { label: region.handler.to_string() },
            )?;
            let known = exception.or(region.catch_type.as_deref());
            let mut thrown = Value::new(Category::Reference, self.lineage.origin(self.pc));
            if let Some(known) = known {
                thrown = thrown.with_known(known);
            }
            let mut stack = self.stack.clone();
            stack.clear();
            stack.push(thrown)?;
            self.stack = stack;
            debug!("throw at {} handled at {} ({index})", self.pc, region.handler);
            self.pc = index;
            self.state = SimState::Pop;
            Ok(())
        });
        self.commit(r)
    }

    /// Try-regions open at the current instruction, most recently opened
    /// last. A region is active at `pc` iff its start label has been seen
    /// and its end label has not (`[start, end)`).
    pub fn active_catches(&self) -> Vec<TryRegion> {
        let mut open: Vec<TryRegion> = Vec::new();
        for insn in self.method.instructions.iter().take(self.pc + 1) {
            if let Insn::Label(label) = insn {
                for region in &self.method.try_regions {
                    if region.start == *label {
                        open.push(region.clone());
                    }
                }
                open.retain(|r| r.end != *label);
            }
        }
        open
    }

    /// Labels the current instruction may transfer control to: declared
    /// branch targets, handler labels for a throw (innermost first), or
    /// the resolved continuation label for a subroutine return.
    pub fn jump_candidates(&self) -> Result<Vec<Label>> {
        if self.pc >= self.effects.len() {
            return Ok(Vec::new());
        }
        let entry = self.entry();
        if entry.is_throw {
            return Ok(self.active_catches().iter().rev().map(|r| r.handler).collect());
        }
        if entry.is_ret {
            return Ok(vec![self.ret_target()?]);
        }
        Ok(entry.jump_targets.clone())
    }

    /// A `ret` returns to the label the decoder placed immediately after
    /// the producing `jsr`. The jsr's index is the first entry of the
    /// return address's history (later entries are store/load moves).
    fn ret_target(&self) -> Result<Label> {
        let var = match self.current_instruction() {
            Some(Insn::Ret(var)) => *var as usize,
            _ => {
                return Err(Error::ContractViolation {
                    expected: "a subroutine return instruction".into(),
                    found: "another opcode".into(),
                })
            }
        };
        let address = self.locals.load(var, Category::ReturnAddress)?;
        let jsr_pc = self.lineage.first_producer(address.lineage).ok_or_else(|| {
            Error::InvalidJumpTarget { label: "a return address with no producer".into() }
        })?;
        self.method.instructions[jsr_pc + 1..]
            .iter()
            .find_map(|insn| match insn {
                Insn::Label(label) => Some(*label),
                _ => None,
            })
            .ok_or_else(|| Error::InvalidJumpTarget {
                label: format!("no label after jsr at {jsr_pc}"),
            })
    }

    /// Operands the current branch consumes, topmost first: peeked from
    /// the stack before the pop phase, read from the retained pop buffer
    /// after it.
    fn branch_operands(&self, count: usize) -> Result<Vec<Value>> {
        match self.state {
            SimState::Pop => (0..count)
                .map(|d| self.stack.peek_logical(d).cloned())
                .collect(),
            SimState::Push | SimState::Jump => Ok(self.popped[..count].to_vec()),
            other => Err(Error::ContractViolation {
                expected: "an instruction in flight".into(),
                found: other.to_string(),
            }),
        }
    }

    /// Statically resolve the current instruction's control flow from the
    /// literals of its operands. Signed fixed-width comparison for
    /// integers, null-vs-null only for references, switch key lookup with
    /// default fallback; anything with an unknown operand is
    /// `Undetermined`.
    pub fn expected_jump_target(&self) -> Result<Prediction> {
        let insn = match self.current_instruction() {
            Some(insn) => insn,
            None => return Ok(Prediction::FallThrough),
        };

        let predict_i1 = |label: Label, cond: fn(i32) -> bool| -> Result<Prediction> {
            let ops = self.branch_operands(1)?;
            Ok(match parse_i32(&ops[0]) {
                Some(v) if cond(v) => Prediction::Target(label),
                Some(_) => Prediction::FallThrough,
                None => Prediction::Undetermined,
            })
        };
        let predict_i2 = |label: Label, cond: fn(i32, i32) -> bool| -> Result<Prediction> {
            let ops = self.branch_operands(2)?;
            Ok(match (parse_i32(&ops[1]), parse_i32(&ops[0])) {
                (Some(a), Some(b)) if cond(a, b) => Prediction::Target(label),
                (Some(_), Some(_)) => Prediction::FallThrough,
                _ => Prediction::Undetermined,
            })
        };

        match insn {
            Insn::Goto(label) | Insn::Jsr(label) => Ok(Prediction::Target(*label)),
            Insn::Ret(_) => Ok(Prediction::Target(self.ret_target()?)),

            Insn::Ifeq(l) => predict_i1(*l, |v| v == 0),
            Insn::Ifne(l) => predict_i1(*l, |v| v != 0),
            Insn::Iflt(l) => predict_i1(*l, |v| v < 0),
            Insn::Ifge(l) => predict_i1(*l, |v| v >= 0),
            Insn::Ifgt(l) => predict_i1(*l, |v| v > 0),
            Insn::Ifle(l) => predict_i1(*l, |v| v <= 0),

            Insn::IfIcmpeq(l) => predict_i2(*l, |a, b| a == b),
            Insn::IfIcmpne(l) => predict_i2(*l, |a, b| a != b),
            Insn::IfIcmplt(l) => predict_i2(*l, |a, b| a < b),
            Insn::IfIcmpge(l) => predict_i2(*l, |a, b| a >= b),
            Insn::IfIcmpgt(l) => predict_i2(*l, |a, b| a > b),
            Insn::IfIcmple(l) => predict_i2(*l, |a, b| a <= b),

            // Only null literals fold; reference identity between non-null
            // values is never resolved.
            Insn::Ifnull(l) => {
                let ops = self.branch_operands(1)?;
                Ok(match is_known_null(&ops[0]) {
                    true => Prediction::Target(*l),
                    false => Prediction::Undetermined,
                })
            }
            Insn::Ifnonnull(_) => {
                let ops = self.branch_operands(1)?;
                Ok(match is_known_null(&ops[0]) {
                    true => Prediction::FallThrough,
                    false => Prediction::Undetermined,
                })
            }
            Insn::IfAcmpeq(l) => {
                let ops = self.branch_operands(2)?;
                Ok(if is_known_null(&ops[0]) && is_known_null(&ops[1]) {
                    Prediction::Target(*l)
                } else {
                    Prediction::Undetermined
                })
            }
            Insn::IfAcmpne(_) => {
                let ops = self.branch_operands(2)?;
                Ok(if is_known_null(&ops[0]) && is_known_null(&ops[1]) {
                    Prediction::FallThrough
                } else {
                    Prediction::Undetermined
                })
            }

            Insn::Tableswitch { min, max, default, targets } => {
                let ops = self.branch_operands(1)?;
                Ok(match parse_i32(&ops[0]) {
                    Some(key) if key >= *min && key <= *max => {
                        Prediction::Target(targets[(key - min) as usize])
                    }
                    Some(_) => Prediction::Target(*default),
                    None => Prediction::Undetermined,
                })
            }
            Insn::Lookupswitch { default, pairs } => {
                let ops = self.branch_operands(1)?;
                Ok(match parse_i32(&ops[0]) {
                    Some(key) => Prediction::Target(
                        pairs
                            .iter()
                            .find(|(k, _)| *k == key)
                            .map(|(_, l)| *l)
                            .unwrap_or(*default),
                    ),
                    None => Prediction::Undetermined,
                })
            }

            Insn::Athrow => Ok(Prediction::Undetermined),
            _ => Ok(Prediction::FallThrough),
        }
    }

    /// Debug name of a local slot at the current instruction, from the
    /// label-delimited live ranges the decoder supplied.
    pub fn local_name(&self, slot: usize) -> Option<&str> {
        self.method.local_debug.iter().find_map(|dbg| {
            if dbg.index as usize != slot {
                return None;
            }
            let start = self.method.label_index(dbg.start)?;
            let end = self.method.label_index(dbg.end)?;
            (start <= self.pc && self.pc < end).then_some(dbg.name.as_str())
        })
    }

    /// Source line of the current instruction: the nearest preceding
    /// label with a line-number entry.
    pub fn line_number(&self) -> Option<u32> {
        self.method
            .instructions
            .iter()
            .take(self.pc + 1)
            .rev()
            .find_map(|insn| match insn {
                Insn::Label(label) => self.method.line_numbers.get(label).copied(),
                _ => None,
            })
    }

    /// Flatten every live value's lineage to just its most recent
    /// producer, capping provenance depth for callers that render it.
    pub fn purge_history(&mut self) {
        let lineage = self.lineage.clone();
        for slots in [self.stack.slots_mut(), self.locals.slots_mut()] {
            let mut carried = None;
            for value in slots.iter_mut() {
                if value.category.is_continuation() {
                    // A continuation shares its owner's lineage.
                    if let Some(l) = carried {
                        value.lineage = l;
                    }
                    continue;
                }
                let purged = match lineage.last_producer(value.lineage) {
                    Some(pc) => lineage.origin(pc),
                    None => lineage.argument(),
                };
                value.lineage = purged;
                carried = Some(purged);
            }
        }
    }
}

fn parse_i32(value: &Value) -> Option<i32> {
    value.known.as_deref()?.parse().ok()
}

fn is_known_null(value: &Value) -> bool {
    value.known.as_deref() == Some("null")
}
