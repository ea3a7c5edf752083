use std::collections::HashMap;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::ir::{self, FunctionBuilder, Module, ValueId};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("unknown operator {0}")]
    UnknownOperator(String),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("invalid number of args in call to {0}: expected {1} found {2}")]
    ArityMismatch(String, usize, usize),
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("conflicting signature for {0}: declared with {1} parameters, redeclared with {2}")]
    SignatureConflict(String, usize, usize),
}

/// lowers AST nodes into IR functions inside the owned module
pub struct Codegen {
    pub module: Module,
    pub named_values: HashMap<String, ValueId>,
}

impl Codegen {
    pub fn new(module_name: &str) -> Codegen {
        Codegen {
            module: Module::new(module_name),
            named_values: HashMap::new(),
        }
    }

    fn codegen_expr(
        &mut self,
        builder: &mut FunctionBuilder,
        expr: &Expression,
    ) -> Result<ValueId, CodegenError> {
        match expr {
            Expression::Literal(value) => Ok(builder.build_const(*value)),
            Expression::Variable(name) => match self.named_values.get(name) {
                Some(&value) => Ok(value),
                None => Err(CodegenError::UnknownVariable(name.clone())),
            },
            Expression::Binary(op, left, right) => {
                // left before right - evaluation order is part of the language
                let lhs = self.codegen_expr(builder, left)?;
                let rhs = self.codegen_expr(builder, right)?;

                match op.as_str() {
                    "+" => Ok(builder.build_add(lhs, rhs)),
                    "-" => Ok(builder.build_sub(lhs, rhs)),
                    "*" => Ok(builder.build_mul(lhs, rhs)),
                    "<" => {
                        let cmp = builder.build_cmp_lt(lhs, rhs);
                        Ok(builder.build_bool_to_num(cmp))
                    }
                    _ => Err(CodegenError::UnknownOperator(op.clone())),
                }
            }
            Expression::Call(callee, args) => {
                let arity = match self.module.get_function(callee) {
                    Some(func) => func.arity(),
                    None => return Err(CodegenError::UnknownFunction(callee.clone())),
                };
                if arity != args.len() {
                    return Err(CodegenError::ArityMismatch(
                        callee.clone(),
                        arity,
                        args.len(),
                    ));
                }

                let mut gened_args = Vec::with_capacity(args.len());
                for arg in args {
                    gened_args.push(self.codegen_expr(builder, arg)?);
                }

                Ok(builder.build_call(callee, gened_args))
            }
        }
    }

    /// an existing entry with a matching parameter count is reused, so
    /// repeated consistent externs and extern-then-def both work
    fn compile_proto(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
        match self.module.get_function(&proto.name) {
            Some(existing) if existing.arity() != proto.args.len() => {
                Err(CodegenError::SignatureConflict(
                    proto.name.clone(),
                    existing.arity(),
                    proto.args.len(),
                ))
            }
            Some(_) => Ok(()),
            None => {
                self.module
                    .add_function(ir::Function::declaration(&proto.name, proto.args.clone()));
                Ok(())
            }
        }
    }

    fn compile_fn(&mut self, function: &Function) -> Result<(), CodegenError> {
        let Function {
            prototype: proto,
            body,
        } = function;

        self.compile_proto(proto)?;
        if let Some(existing) = self.module.get_function(&proto.name) {
            if existing.is_defined() {
                return Err(CodegenError::Redefinition(proto.name.clone()));
            }
        }

        let mut builder = FunctionBuilder::new(&proto.name, &proto.args);

        // fresh scope per function body, parameters only
        self.named_values.clear();
        self.named_values.reserve(proto.args.len());
        for (i, arg) in proto.args.iter().enumerate() {
            self.named_values.insert(arg.clone(), builder.param(i));
        }

        match self.codegen_expr(&mut builder, body) {
            Ok(ret) => {
                builder.build_return(ret);
                self.module.add_function(builder.finish());
                Ok(())
            }
            Err(err) => {
                // no half-built function stays observable, a prior
                // declaration of the same name included
                self.module.remove_function(&proto.name);
                Err(err)
            }
        }
    }

    pub fn codegen_node(&mut self, node: &ASTNode) -> Result<(), CodegenError> {
        match node {
            ASTNode::Function(func) => {
                if func.is_anonymous() {
                    // each bare top-level expression replaces the previous
                    // anonymous wrapper
                    self.module.remove_function("");
                }
                self.compile_fn(func)
            }
            ASTNode::Extern(proto) => self.compile_proto(proto),
        }
    }

    pub fn codegen(&mut self, ast_nodes: &[ASTNode]) -> Result<(), CodegenError> {
        for node in ast_nodes {
            self.codegen_node(node)?;
        }
        Ok(())
    }
}
