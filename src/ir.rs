//! Register-style IR the lowering pass emits into.
//!
//! Everything is the language's single numeric type, so instructions carry no
//! type information - only operand value ids. Parameters take the first ids
//! of a function (`0..arity`), instruction results are numbered after them in
//! emission order.

use std::fmt;

/// opaque handle to a value inside one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    /// load a floating point constant
    Const(f64),
    FAdd(ValueId, ValueId),
    FSub(ValueId, ValueId),
    FMul(ValueId, ValueId),
    /// ordered less-than, boolean-like result
    FCmpLt(ValueId, ValueId),
    /// boolean-like value to 1.0 / 0.0
    UIToFP(ValueId),
    Call(String, Vec<ValueId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: ValueId,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminator {
    Ret(ValueId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub instrs: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

/// a function entry in a [`Module`] - a declaration until it has blocks
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn declaration(name: &str, params: Vec<String>) -> Function {
        Function {
            name: name.to_string(),
            params,
            blocks: Vec::new(),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    fn value(&self, id: ValueId) -> String {
        match self.params.get(id.0 as usize) {
            Some(name) => format!("%{}", name),
            None => format!("%{}", id.0),
        }
    }

    fn render(&self, kind: &InstrKind) -> String {
        match kind {
            InstrKind::Const(num) => format!("const {}", num),
            InstrKind::FAdd(lhs, rhs) => {
                format!("fadd {}, {}", self.value(*lhs), self.value(*rhs))
            }
            InstrKind::FSub(lhs, rhs) => {
                format!("fsub {}, {}", self.value(*lhs), self.value(*rhs))
            }
            InstrKind::FMul(lhs, rhs) => {
                format!("fmul {}, {}", self.value(*lhs), self.value(*rhs))
            }
            InstrKind::FCmpLt(lhs, rhs) => {
                format!("fcmp ult {}, {}", self.value(*lhs), self.value(*rhs))
            }
            InstrKind::UIToFP(value) => format!("uitofp {}", self.value(*value)),
            InstrKind::Call(callee, args) => {
                let args = args
                    .iter()
                    .map(|&arg| self.value(arg))
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("call @{}({})", callee, args)
            }
        }
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "__anon_expr"
        } else {
            &self.name
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|name| format!("%{}", name))
            .collect::<Vec<String>>()
            .join(", ");

        if !self.is_defined() {
            return write!(f, "declare @{}({})", self.display_name(), params);
        }

        writeln!(f, "define @{}({}) {{", self.display_name(), params)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for instr in &block.instrs {
                writeln!(
                    f,
                    "  {} = {}",
                    self.value(instr.result),
                    self.render(&instr.kind)
                )?;
            }
            if let Some(Terminator::Ret(value)) = block.terminator {
                writeln!(f, "  ret {}", self.value(value))?;
            }
        }
        write!(f, "}}")
    }
}

/// all functions declared or defined by one compilation session, names unique
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            functions: Vec::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }

    /// insert a function, replacing any existing entry with the same name
    pub fn add_function(&mut self, func: Function) {
        match self.functions.iter_mut().find(|f| f.name == func.name) {
            Some(slot) => *slot = func,
            None => self.functions.push(func),
        }
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let index = self.functions.iter().position(|func| func.name == name)?;
        Some(self.functions.remove(index))
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for func in &self.functions {
            writeln!(f, "{}", func)?;
        }
        Ok(())
    }
}

/// builds one function body detached from the module; nothing is observable
/// until the finished function is committed with [`Module::add_function`]
pub struct FunctionBuilder {
    func: Function,
    next_value: u32,
}

impl FunctionBuilder {
    /// opens the entry block and binds ids `0..params.len()` to the parameters
    pub fn new(name: &str, params: &[String]) -> FunctionBuilder {
        let entry = Block {
            label: "entry".to_string(),
            instrs: Vec::new(),
            terminator: None,
        };
        FunctionBuilder {
            next_value: params.len() as u32,
            func: Function {
                name: name.to_string(),
                params: params.to_vec(),
                blocks: vec![entry],
            },
        }
    }

    pub fn param(&self, index: usize) -> ValueId {
        ValueId(index as u32)
    }

    fn push(&mut self, kind: InstrKind) -> ValueId {
        let result = ValueId(self.next_value);
        self.next_value += 1;
        // single entry block - the language has no control flow
        self.func.blocks[0].instrs.push(Instruction { result, kind });
        result
    }

    pub fn build_const(&mut self, value: f64) -> ValueId {
        self.push(InstrKind::Const(value))
    }

    pub fn build_add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::FAdd(lhs, rhs))
    }

    pub fn build_sub(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::FSub(lhs, rhs))
    }

    pub fn build_mul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::FMul(lhs, rhs))
    }

    pub fn build_cmp_lt(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::FCmpLt(lhs, rhs))
    }

    pub fn build_bool_to_num(&mut self, value: ValueId) -> ValueId {
        self.push(InstrKind::UIToFP(value))
    }

    pub fn build_call(&mut self, callee: &str, args: Vec<ValueId>) -> ValueId {
        self.push(InstrKind::Call(callee.to_string(), args))
    }

    pub fn build_return(&mut self, value: ValueId) {
        self.func.blocks[0].terminator = Some(Terminator::Ret(value));
    }

    pub fn finish(self) -> Function {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn values_number_params_first() {
        let params = vec!["x".to_string(), "y".to_string()];
        let mut builder = FunctionBuilder::new("f", &params);
        assert_eq!(builder.param(0), ValueId(0));
        assert_eq!(builder.param(1), ValueId(1));

        let sum = builder.build_add(builder.param(0), builder.param(1));
        assert_eq!(sum, ValueId(2));
        let one = builder.build_const(1.0);
        assert_eq!(one, ValueId(3));
    }

    #[test]
    fn add_function_replaces_same_name() {
        let mut module = Module::new("test");
        module.add_function(Function::declaration("f", vec!["x".to_string()]));
        assert!(!module.get_function("f").unwrap().is_defined());

        let mut builder = FunctionBuilder::new("f", &["x".to_string()]);
        let ret = builder.param(0);
        builder.build_return(ret);
        module.add_function(builder.finish());

        assert_eq!(module.functions().count(), 1);
        assert!(module.get_function("f").unwrap().is_defined());
    }

    #[test]
    fn display_renders_params_by_name() {
        let params = vec!["x".to_string()];
        let mut builder = FunctionBuilder::new("inc", &params);
        let one = builder.build_const(1.0);
        let sum = builder.build_add(builder.param(0), one);
        builder.build_return(sum);
        let func = builder.finish();

        let expected = "\
define @inc(%x) {
entry:
  %1 = const 1
  %2 = fadd %x, %1
  ret %2
}";
        assert_eq!(func.to_string(), expected);
    }

    #[test]
    fn display_declaration() {
        let func = Function::declaration("sin", vec!["x".to_string()]);
        assert_eq!(func.to_string(), "declare @sin(%x)");
    }
}
