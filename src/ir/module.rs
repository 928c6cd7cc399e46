//! IR module, function, and basic block definitions
//!
//! Functions own their values and instructions in flat tables and refer
//! to them by index, so handles stay valid across in-place mutation of
//! the basic-block instruction lists. Every value carries an explicit use
//! count, maintained by the mutation API; an instruction may only be
//! erased once its result is unused, which is what lets the sandboxing
//! pass delete redundant instructions in dependency order without
//! leaving dangling references.

use std::fmt;

use super::instruction::{InstData, InstId, Opcode, SourceLoc};
use super::types::Type;
use super::value::{GlobalId, ValueData, ValueId, ValueKind};

/// Linkage of a module global
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Declared here, defined by the embedder/runtime
    Import,
    /// Defined here, visible to the embedder/runtime
    Export,
}

/// A module-level global variable or constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalData {
    /// Symbol name
    pub name: String,
    /// Value type of the global
    pub ty: Type,
    /// Read-only constant
    pub is_constant: bool,
    /// Import or export linkage
    pub linkage: Linkage,
    /// Initializer for defined globals
    pub initializer: Option<i64>,
}

/// Basic block: a label and an ordered instruction list
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Label identifying this basic block
    pub label: String,
    /// Instructions in program order
    pub insts: Vec<InstId>,
    /// Labels of successor blocks
    pub successors: Vec<String>,
}

impl BasicBlock {
    /// Create a new empty basic block with the given label
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            insts: Vec::new(),
            successors: Vec::new(),
        }
    }
}

/// A function: ordered basic blocks over flat value/instruction tables
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Basic blocks in layout order; block 0 is the entry block
    pub blocks: Vec<BasicBlock>,
    values: Vec<ValueData>,
    insts: Vec<InstData>,
    uses: Vec<u32>,
    args: Vec<ValueId>,
}

impl Function {
    /// Create a function with the given argument types and a single empty
    /// entry block
    pub fn new(name: impl Into<String>, params: Vec<Type>) -> Self {
        let mut func = Self {
            name: name.into(),
            blocks: vec![BasicBlock::new("entry")],
            values: Vec::new(),
            insts: Vec::new(),
            uses: Vec::new(),
            args: Vec::new(),
        };
        for (idx, ty) in params.into_iter().enumerate() {
            let arg = func.new_value(ty, ValueKind::Argument(idx as u32));
            func.args.push(arg);
        }
        func
    }

    /// Append a new empty basic block, returning its index
    pub fn add_block(&mut self, label: &str) -> usize {
        self.blocks.push(BasicBlock::new(label));
        self.blocks.len() - 1
    }

    /// Number of function arguments
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Value of the argument at the given position
    pub fn arg(&self, idx: usize) -> ValueId {
        self.args[idx]
    }

    fn new_value(&mut self, ty: Type, kind: ValueKind) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, kind });
        self.uses.push(0);
        id
    }

    /// Materialize a 32-bit integer constant
    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.new_value(Type::I32, ValueKind::Const(i64::from(value)))
    }

    /// Materialize a 64-bit integer constant
    pub fn const_i64(&mut self, value: i64) -> ValueId {
        self.new_value(Type::I64, ValueKind::Const(value))
    }

    /// Materialize the address of a module global. The resulting value
    /// has pointer-to-`pointee` type.
    pub fn global_addr(&mut self, global: GlobalId, pointee: Type) -> ValueId {
        self.new_value(Type::ptr_to(pointee), ValueKind::Global(global))
    }

    /// Data of a value
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    /// Number of operand slots currently referencing a value
    pub fn use_count(&self, id: ValueId) -> u32 {
        self.uses[id.index()]
    }

    /// Instruction that produces a value, if any
    pub fn defining_inst(&self, id: ValueId) -> Option<InstId> {
        match self.values[id.index()].kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Data of an instruction
    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    /// Result value of a value-producing instruction.
    ///
    /// Panics if the instruction produces no value; callers dispatch on
    /// opcode and only ask for results of value-producing kinds.
    pub fn result(&self, id: InstId) -> ValueId {
        self.insts[id.index()]
            .result
            .expect("instruction produces no result")
    }

    /// True if the instruction produces a value and nothing uses it
    pub fn result_unused(&self, id: InstId) -> bool {
        match self.insts[id.index()].result {
            Some(value) => self.uses[value.index()] == 0,
            None => false,
        }
    }

    fn build_inst(
        &mut self,
        opcode: Opcode,
        operands: Vec<ValueId>,
        result: Option<Type>,
    ) -> InstId {
        for op in &operands {
            self.uses[op.index()] += 1;
        }
        let id = InstId(self.insts.len() as u32);
        let result = result.map(|ty| self.new_value(ty, ValueKind::Inst(id)));
        self.insts.push(InstData {
            opcode,
            operands,
            result,
            loc: None,
        });
        id
    }

    /// Append an instruction to a block
    pub fn push_inst(
        &mut self,
        block: usize,
        opcode: Opcode,
        operands: Vec<ValueId>,
        result: Option<Type>,
    ) -> InstId {
        let id = self.build_inst(opcode, operands, result);
        self.blocks[block].insts.push(id);
        id
    }

    /// Insert an instruction into a block at the given position
    pub fn insert_inst(
        &mut self,
        block: usize,
        pos: usize,
        opcode: Opcode,
        operands: Vec<ValueId>,
        result: Option<Type>,
    ) -> InstId {
        let id = self.build_inst(opcode, operands, result);
        self.blocks[block].insts.insert(pos, id);
        id
    }

    /// Replace one operand of an instruction, keeping use counts exact
    pub fn set_operand(&mut self, inst: InstId, idx: usize, value: ValueId) {
        let old = self.insts[inst.index()].operands[idx];
        self.uses[old.index()] -= 1;
        self.uses[value.index()] += 1;
        self.insts[inst.index()].operands[idx] = value;
    }

    /// Set the source location of an instruction
    pub fn set_loc(&mut self, inst: InstId, loc: Option<SourceLoc>) {
        self.insts[inst.index()].loc = loc;
    }

    /// Copy the source location of `from` onto `to`
    pub fn copy_loc(&mut self, to: InstId, from: InstId) {
        self.insts[to.index()].loc = self.insts[from.index()].loc;
    }

    /// Position of an instruction within a block, if present
    pub fn position(&self, block: usize, inst: InstId) -> Option<usize> {
        self.blocks[block].insts.iter().position(|&id| id == inst)
    }

    /// Block index and position of an instruction, if present anywhere
    pub fn find_inst(&self, inst: InstId) -> Option<(usize, usize)> {
        for (block_idx, block) in self.blocks.iter().enumerate() {
            if let Some(pos) = block.insts.iter().position(|&id| id == inst) {
                return Some((block_idx, pos));
            }
        }
        None
    }

    /// Erase an instruction from its block and release its operand uses.
    ///
    /// The caller must ensure the result (if any) is unused; erasing in
    /// dependency order (dependent first) keeps this invariant easy to
    /// uphold for chains.
    pub fn erase_inst(&mut self, inst: InstId) {
        debug_assert!(
            self.insts[inst.index()].result.is_none() || self.result_unused(inst),
            "erasing an instruction whose result is still referenced"
        );
        if let Some((block, pos)) = self.find_inst(inst) {
            self.blocks[block].insts.remove(pos);
        }
        let operands = std::mem::take(&mut self.insts[inst.index()].operands);
        for op in operands {
            self.uses[op.index()] -= 1;
        }
    }

    /// Total number of instructions currently placed in blocks
    pub fn inst_count(&self) -> usize {
        self.blocks.iter().map(|block| block.insts.len()).sum()
    }
}

/// A compilation unit: functions plus module-level globals
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name, used in diagnostics
    pub name: String,
    /// Functions in module order
    pub functions: Vec<Function>,
    globals: Vec<GlobalData>,
}

impl Module {
    /// Create a new empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Append a function, returning its index
    pub fn add_function(&mut self, func: Function) -> usize {
        self.functions.push(func);
        self.functions.len() - 1
    }

    /// Look up a global declaration by name, or declare it as an import
    /// of the given type
    pub fn get_or_insert_global(&mut self, name: &str, ty: Type) -> GlobalId {
        if let Some(idx) = self.globals.iter().position(|g| g.name == name) {
            return GlobalId(idx as u32);
        }
        self.define_global(GlobalData {
            name: name.to_string(),
            ty,
            is_constant: false,
            linkage: Linkage::Import,
            initializer: None,
        })
    }

    /// Add a fully specified global, returning its handle
    pub fn define_global(&mut self, data: GlobalData) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(data);
        id
    }

    /// Data of a global
    pub fn global(&self, id: GlobalId) -> &GlobalData {
        &self.globals[id.index()]
    }

    /// Look up a global by symbol name
    pub fn global_by_name(&self, name: &str) -> Option<(GlobalId, &GlobalData)> {
        self.globals
            .iter()
            .enumerate()
            .find(|(_, g)| g.name == name)
            .map(|(idx, g)| (GlobalId(idx as u32), g))
    }

    /// Iterator over all globals
    pub fn globals(&self) -> impl Iterator<Item = &GlobalData> {
        self.globals.iter()
    }
}

impl Function {
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, value: ValueId) -> fmt::Result {
        let data = &self.values[value.index()];
        match data.kind {
            ValueKind::Const(c) => write!(f, "{} {}", data.ty, c),
            ValueKind::Argument(idx) => write!(f, "{} %arg{}", data.ty, idx),
            ValueKind::Global(global) => write!(f, "{} @g{}", data.ty, global.0),
            ValueKind::Inst(_) => write!(f, "{} %{}", data.ty, value.0),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %arg{}", self.values[arg.index()].ty, idx)?;
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for &inst in &block.insts {
                let data = &self.insts[inst.index()];
                write!(f, "  ")?;
                if let Some(result) = data.result {
                    write!(f, "%{} = ", result.0)?;
                }
                write!(f, "{}", data.opcode)?;
                for (idx, &op) in data.operands.iter().enumerate() {
                    write!(f, "{}", if idx == 0 { " " } else { ", " })?;
                    self.fmt_operand(f, op)?;
                }
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for (idx, global) in self.globals.iter().enumerate() {
            let kind = if global.is_constant { "const" } else { "global" };
            write!(f, "@g{} = {:?} {} {} {}", idx, global.linkage, kind, global.ty, global.name)?;
            match global.initializer {
                Some(init) => writeln!(f, " = {}", init)?,
                None => writeln!(f)?,
            }
        }
        for func in &self.functions {
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
