//! Execution machine
//!
//! A small deterministic interpreter for method bodies. It is what tests and
//! the `invoke` command use to show that a replaced body never runs and that
//! a guarded body never leaks a fault past its method.
//!
//! # Core Concepts
//!
//! - **Statics** of a class are set up on first use: field initializers in
//!   declaration order, then `<clinit>`.
//! - **Instances** get their instance-field initializers and every
//!   `<init>()` along the super chain, super class first.
//! - **Faults** are values. `throw` and every runtime error produce one; a
//!   guarded region binds its message and runs the handler instead.
//! - **Log output** is collected in order and read back with
//!   [`Machine::output`].
//!
//! # Example
//!
//! ```rust,ignore
//! let mut machine = Machine::new(corpus.classes());
//! machine.invoke(&name("com.example.Foo"), "test", Vec::new())?;
//! assert_eq!(machine.output(), ["injected test"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use stitch_artifact::{
    BinOp, ClassFile, ClassKind, ClassName, Expr, FieldDecl, MethodDecl, Stmt, TypeName, Value,
    CLASS_INIT, INSTANCE_INIT,
};

/// Nested call limit
pub const MAX_CALL_DEPTH: usize = 256;

/// Super-chain walk limit
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Heap object handle
pub type ObjectId = usize;

/// Runtime value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Value(Value),
    Object(ObjectId),
}

impl Slot {
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Slot::Value(Value::Null)
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Slot::Value(v) => v.is_truthy(),
            Slot::Object(_) => true,
        }
    }

    /// The constant, if this is not an object reference
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(v) => Some(v),
            Slot::Object(_) => None,
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Value(v) => write!(f, "{v}"),
            Slot::Object(id) => write!(f, "object#{id}"),
        }
    }
}

/// Abnormal completion of a call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// Raised by a `throw` statement
    #[error("{0}")]
    Thrown(String),

    #[error("no class {0}")]
    NoClass(String),

    #[error("no method {class}.{method} taking {arity} argument(s)")]
    NoMethod {
        class: String,
        method: String,
        arity: usize,
    },

    #[error("no field {class}.{field}")]
    NoField { class: String, field: String },

    /// Operation on a value of the wrong shape
    #[error("{0}")]
    Type(String),

    #[error("call depth exceeded {MAX_CALL_DEPTH}")]
    StackOverflow,
}

#[derive(Debug)]
struct Instance {
    class: ClassName,
    fields: HashMap<String, Slot>,
}

struct Frame<'c> {
    class: &'c ClassName,
    this: Option<ObjectId>,
    args: Vec<Slot>,
    locals: HashMap<String, Slot>,
}

impl<'c> Frame<'c> {
    fn new(class: &'c ClassName, this: Option<ObjectId>, args: Vec<Slot>) -> Self {
        Self {
            class,
            this,
            args,
            locals: HashMap::new(),
        }
    }

    fn receiver(&self, what: &str) -> Result<ObjectId, Fault> {
        self.this
            .ok_or_else(|| Fault::Type(format!("{what} needs a receiver")))
    }
}

enum Flow {
    Next,
    Return(Slot),
}

/// Interpreter over a set of classes
#[derive(Debug)]
pub struct Machine<'c> {
    classes: HashMap<&'c ClassName, &'c ClassFile>,
    statics: HashMap<(ClassName, String), Slot>,
    initialized: HashSet<ClassName>,
    heap: Vec<Instance>,
    output: Vec<String>,
    depth: usize,
}

impl<'c> Machine<'c> {
    /// Machine over `classes`; later duplicates shadow earlier ones
    #[must_use]
    pub fn new(classes: impl IntoIterator<Item = &'c ClassFile>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (&c.name, c)).collect(),
            statics: HashMap::new(),
            initialized: HashSet::new(),
            heap: Vec::new(),
            output: Vec::new(),
            depth: 0,
        }
    }

    /// Log lines written so far
    #[inline]
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Drain the log
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Call `method` on `class`
    ///
    /// Static methods are called directly; instance methods on a fresh
    /// instance of `class`.
    ///
    /// # Errors
    /// Returns the fault the call completed with
    pub fn invoke(&mut self, class: &ClassName, method: &str, args: Vec<Slot>) -> Result<Slot, Fault> {
        let (owner, decl) = self.find_method(class, method, args.len())?;
        if decl.modifiers.is_static {
            self.ensure_init(&owner.name)?;
            self.call(owner, decl, None, args)
        } else {
            let this = self.instantiate(class)?;
            self.call(owner, decl, Some(this), args)
        }
    }

    /// Call an instance method on an existing object
    ///
    /// # Errors
    /// Returns the fault the call completed with
    pub fn invoke_on(&mut self, this: ObjectId, method: &str, args: Vec<Slot>) -> Result<Slot, Fault> {
        let class = self.instance(this)?.class.clone();
        let (owner, decl) = self.find_method(&class, method, args.len())?;
        let receiver = (!decl.modifiers.is_static).then_some(this);
        self.call(owner, decl, receiver, args)
    }

    /// Create an instance of `class`
    ///
    /// # Errors
    /// Returns error for unknown or interface classes, or a fault raised by
    /// an initializer
    pub fn instantiate(&mut self, class: &ClassName) -> Result<ObjectId, Fault> {
        self.ensure_init(class)?;
        let top = self.class(class)?;
        if top.kind == ClassKind::Interface {
            return Err(Fault::Type(format!("cannot instantiate interface {class}")));
        }

        let id = self.heap.len();
        self.heap.push(Instance {
            class: class.clone(),
            fields: HashMap::new(),
        });

        let mut chain = self.chain(class);
        chain.reverse();
        for owner in chain {
            for field in owner.fields.iter().filter(|f| !f.modifiers.is_static) {
                let mut frame = Frame::new(&owner.name, Some(id), Vec::new());
                let value = self.initial_value(field, &mut frame)?;
                self.heap[id].fields.insert(field.name.clone(), value);
            }
            if let Some(init) = owner
                .methods
                .iter()
                .find(|m| m.name == INSTANCE_INIT && m.params.is_empty())
            {
                self.call(owner, init, Some(id), Vec::new())?;
            }
        }
        Ok(id)
    }

    /// Current value of a static field, initializing its class first
    ///
    /// # Errors
    /// Returns error if the field does not exist or initialization faults
    pub fn static_value(&mut self, class: &ClassName, field: &str) -> Result<Slot, Fault> {
        self.read_static(class, field)
    }

    /// Current value of an instance field
    #[must_use]
    pub fn field_value(&self, this: ObjectId, field: &str) -> Option<&Slot> {
        self.heap.get(this).and_then(|i| i.fields.get(field))
    }

    fn class(&self, name: &ClassName) -> Result<&'c ClassFile, Fault> {
        self.classes
            .get(name)
            .copied()
            .ok_or_else(|| Fault::NoClass(name.to_string()))
    }

    fn instance(&self, id: ObjectId) -> Result<&Instance, Fault> {
        self.heap
            .get(id)
            .ok_or_else(|| Fault::Type(format!("dangling object#{id}")))
    }

    /// `name` and its super classes present in the machine
    fn chain(&self, name: &ClassName) -> Vec<&'c ClassFile> {
        let mut chain = Vec::new();
        let mut next = self.classes.get(name).copied();
        while let Some(class) = next {
            if chain.len() == MAX_HIERARCHY_DEPTH {
                break;
            }
            chain.push(class);
            next = class
                .super_class
                .as_ref()
                .and_then(|s| self.classes.get(s).copied());
        }
        chain
    }

    fn find_method(
        &self,
        class: &ClassName,
        method: &str,
        arity: usize,
    ) -> Result<(&'c ClassFile, &'c MethodDecl), Fault> {
        self.class(class)?;
        self.chain(class)
            .into_iter()
            .find_map(|owner| {
                owner
                    .methods
                    .iter()
                    .find(|m| m.name == method && m.params.len() == arity)
                    .map(|m| (owner, m))
            })
            .ok_or_else(|| Fault::NoMethod {
                class: class.to_string(),
                method: method.to_string(),
                arity,
            })
    }

    fn find_field(&self, class: &ClassName, field: &str) -> Option<(&'c ClassFile, &'c FieldDecl)> {
        self.chain(class)
            .into_iter()
            .find_map(|owner| owner.field(field).map(|f| (owner, f)))
    }

    fn ensure_init(&mut self, name: &ClassName) -> Result<(), Fault> {
        if self.initialized.contains(name) {
            return Ok(());
        }
        let class = self.class(name)?;
        self.initialized.insert(name.clone());

        if let Some(parent) = &class.super_class {
            if self.classes.contains_key(parent) {
                self.ensure_init(parent)?;
            }
        }
        for field in class.fields.iter().filter(|f| f.modifiers.is_static) {
            let mut frame = Frame::new(&class.name, None, Vec::new());
            let value = self.initial_value(field, &mut frame)?;
            self.statics
                .insert((class.name.clone(), field.name.clone()), value);
        }
        if let Some(clinit) = class
            .methods
            .iter()
            .find(|m| m.name == CLASS_INIT && m.params.is_empty())
        {
            self.call(class, clinit, None, Vec::new())?;
        }
        tracing::trace!(class = %name, "class initialized");
        Ok(())
    }

    fn initial_value(&mut self, field: &'c FieldDecl, frame: &mut Frame<'c>) -> Result<Slot, Fault> {
        match &field.initializer {
            Some(init) => self.eval(init, frame),
            None => Ok(default_value(&field.ty)),
        }
    }

    fn read_static(&mut self, class: &ClassName, field: &str) -> Result<Slot, Fault> {
        self.ensure_init(class)?;
        let (owner, _) = self.static_field(class, field)?;
        self.ensure_init(&owner.name)?;
        Ok(self
            .statics
            .get(&(owner.name.clone(), field.to_string()))
            .cloned()
            .unwrap_or_else(Slot::null))
    }

    fn write_static(&mut self, class: &ClassName, field: &str, value: Slot) -> Result<(), Fault> {
        self.ensure_init(class)?;
        let (owner, _) = self.static_field(class, field)?;
        self.statics
            .insert((owner.name.clone(), field.to_string()), value);
        Ok(())
    }

    fn static_field(&self, class: &ClassName, field: &str) -> Result<(&'c ClassFile, &'c FieldDecl), Fault> {
        self.find_field(class, field)
            .filter(|(_, f)| f.modifiers.is_static)
            .ok_or_else(|| Fault::NoField {
                class: class.to_string(),
                field: field.to_string(),
            })
    }

    fn call(
        &mut self,
        owner: &'c ClassFile,
        method: &'c MethodDecl,
        this: Option<ObjectId>,
        args: Vec<Slot>,
    ) -> Result<Slot, Fault> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Fault::StackOverflow);
        }
        let Some(body) = &method.body else {
            return Err(Fault::Type(format!(
                "{}.{} has no body",
                owner.name,
                method.signature()
            )));
        };
        if args.len() != method.params.len() {
            return Err(Fault::Type(format!(
                "{}.{} called with {} argument(s)",
                owner.name,
                method.signature(),
                args.len()
            )));
        }

        let this = if method.modifiers.is_static { None } else { this };
        let mut frame = Frame::new(&owner.name, this, args);
        self.depth += 1;
        let flow = self.exec_block(body, &mut frame);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Slot::null()),
        }
    }

    fn exec_block(&mut self, stmts: &'c [Stmt], frame: &mut Frame<'c>) -> Result<Flow, Fault> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt, frame)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, stmt: &'c Stmt, frame: &mut Frame<'c>) -> Result<Flow, Fault> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value, frame)?;
                frame.locals.insert(name.clone(), value);
            }
            Stmt::SetStatic { owner, name, value } => {
                let value = self.eval(value, frame)?;
                self.write_static(owner, name, value)?;
            }
            Stmt::SetInstance { name, value } => {
                let value = self.eval(value, frame)?;
                self.write_own_field(frame, name, value)?;
            }
            Stmt::Eval { expr } => {
                self.eval(expr, frame)?;
            }
            Stmt::Log { message } => {
                let line = self.eval(message, frame)?.to_string();
                self.output.push(line);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if self.eval(cond, frame)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                return self.exec_block(branch, frame);
            }
            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Slot::null(),
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw { message } => {
                let message = self.eval(message, frame)?.to_string();
                return Err(Fault::Thrown(message));
            }
            Stmt::Guard {
                body,
                binding,
                handler,
            } => {
                return match self.exec_block(body, frame) {
                    Ok(flow) => Ok(flow),
                    Err(fault) => {
                        tracing::trace!(class = %frame.class, %fault, "fault caught");
                        frame
                            .locals
                            .insert(binding.clone(), Slot::Value(Value::Str(fault.to_string())));
                        self.exec_block(handler, frame)
                    }
                };
            }
        }
        Ok(Flow::Next)
    }

    fn eval(&mut self, expr: &'c Expr, frame: &mut Frame<'c>) -> Result<Slot, Fault> {
        match expr {
            Expr::Const { value } => Ok(Slot::Value(value.clone())),
            Expr::This => frame.receiver("this").map(Slot::Object),
            Expr::Param { index } => frame
                .args
                .get(usize::from(*index))
                .cloned()
                .ok_or_else(|| Fault::Type(format!("no parameter {index}"))),
            Expr::Local { name } => frame
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| Fault::Type(format!("unbound local '{name}'"))),
            Expr::StaticField { owner, name } => self.read_static(owner, name),
            Expr::InstanceField { name } => self.read_own_field(frame, name),
            Expr::InvokeStatic {
                owner,
                method,
                args,
            } => {
                let args = self.eval_args(args, frame)?;
                let (declaring, decl) = self.find_method(owner, method, args.len())?;
                if !decl.modifiers.is_static {
                    return Err(Fault::Type(format!("{owner}.{method} is not static")));
                }
                self.ensure_init(&declaring.name)?;
                self.call(declaring, decl, None, args)
            }
            Expr::InvokeVirtual { method, args } => {
                let args = self.eval_args(args, frame)?;
                let dispatch = match frame.this {
                    Some(this) => self.instance(this)?.class.clone(),
                    None => frame.class.clone(),
                };
                let (declaring, decl) = self.find_method(&dispatch, method, args.len())?;
                if decl.modifiers.is_static {
                    self.ensure_init(&declaring.name)?;
                    self.call(declaring, decl, None, args)
                } else {
                    let this = frame.receiver(method)?;
                    self.call(declaring, decl, Some(this), args)
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, frame)?;
                let rhs = self.eval(rhs, frame)?;
                binary(*op, &lhs, &rhs)
            }
        }
    }

    fn eval_args(&mut self, args: &'c [Expr], frame: &mut Frame<'c>) -> Result<Vec<Slot>, Fault> {
        args.iter().map(|a| self.eval(a, frame)).collect()
    }

    /// Bare field name: a static of the current class or a field of `this`
    fn read_own_field(&mut self, frame: &Frame<'c>, name: &str) -> Result<Slot, Fault> {
        if self.is_static_of(frame.class, name) {
            return self.read_static(frame.class, name);
        }
        let this = frame.receiver(name)?;
        let instance = self.instance(this)?;
        instance
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| Fault::NoField {
                class: instance.class.to_string(),
                field: name.to_string(),
            })
    }

    fn write_own_field(&mut self, frame: &Frame<'c>, name: &str, value: Slot) -> Result<(), Fault> {
        if self.is_static_of(frame.class, name) {
            return self.write_static(frame.class, name, value);
        }
        let this = frame.receiver(name)?;
        let instance = self
            .heap
            .get_mut(this)
            .ok_or_else(|| Fault::Type(format!("dangling object#{this}")))?;
        instance.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn is_static_of(&self, class: &ClassName, field: &str) -> bool {
        self.find_field(class, field)
            .is_some_and(|(_, f)| f.modifiers.is_static)
    }
}

fn default_value(ty: &TypeName) -> Slot {
    Slot::Value(match ty {
        TypeName::Bool => Value::Bool(false),
        TypeName::Int | TypeName::Long => Value::Int(0),
        _ => Value::Null,
    })
}

fn int(slot: &Slot, op: BinOp) -> Result<i64, Fault> {
    match slot {
        Slot::Value(Value::Int(i)) => Ok(*i),
        other => Err(Fault::Type(format!("{op:?} needs integers, got {other}"))),
    }
}

fn binary(op: BinOp, lhs: &Slot, rhs: &Slot) -> Result<Slot, Fault> {
    let overflow = || Fault::Type(format!("integer overflow in {op:?}"));
    Ok(Slot::Value(match op {
        BinOp::Add => match (lhs, rhs) {
            (Slot::Value(Value::Int(a)), Slot::Value(Value::Int(b))) => {
                Value::Int(a.checked_add(*b).ok_or_else(overflow)?)
            }
            (Slot::Value(Value::Str(_)), _) | (_, Slot::Value(Value::Str(_))) => {
                Value::Str(format!("{lhs}{rhs}"))
            }
            _ => return Err(Fault::Type(format!("cannot add {lhs} and {rhs}"))),
        },
        BinOp::Sub => Value::Int(
            int(lhs, op)?
                .checked_sub(int(rhs, op)?)
                .ok_or_else(overflow)?,
        ),
        BinOp::Eq => Value::Bool(lhs == rhs),
        BinOp::Ne => Value::Bool(lhs != rhs),
        BinOp::Lt => Value::Bool(int(lhs, op)? < int(rhs, op)?),
        BinOp::Gt => Value::Bool(int(lhs, op)? > int(rhs, op)?),
    }))
}
