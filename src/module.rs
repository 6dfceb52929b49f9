// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! The registration boundary.
//!
//! A [`Module`] maps function names to entry points taking positional, dynamically typed
//! [`Arg`]s, which is the shape a foreign runtime (a scripting language, an RPC layer) calls into.
//! [`register`] installs the eGTO entry points under their public names.

use crate::{
    binding::{get_egto, get_egto_rswitch, get_element_types},
    error::{EgtoError, Result},
    kernels::Backend,
    tensor::Tensor,
};
use std::{fmt, sync::Arc};

/// A positional argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Float(Tensor<f32>),
    Int(Tensor<i32>),
    Scalar(f64),
    Integer(i64),
    Bool(bool),
}

impl Arg {
    fn kind(&self) -> &'static str {
        match self {
            Arg::Float(_) => "float tensor",
            Arg::Int(_) => "int tensor",
            Arg::Scalar(_) => "float",
            Arg::Integer(_) => "int",
            Arg::Bool(_) => "bool",
        }
    }
}

impl From<Tensor<f32>> for Arg {
    fn from(tensor: Tensor<f32>) -> Self {
        Arg::Float(tensor)
    }
}

impl From<Tensor<i32>> for Arg {
    fn from(tensor: Tensor<i32>) -> Self {
        Arg::Int(tensor)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Scalar(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Integer(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

pub type EntryPoint = fn(&dyn Backend, &[Arg]) -> Result<Vec<Arg>>;

/// A registered entry point.
#[derive(Clone)]
pub struct Function {
    name: &'static str,
    doc: &'static str,
    entry: EntryPoint,
}

impl Function {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish()
    }
}

/// A named collection of entry points bound to one backend.
pub struct Module {
    name: String,
    backend: Arc<dyn Backend>,
    functions: Vec<Function>,
}

impl Module {
    /// An empty module.  Most callers want [`Module::egto`].
    pub fn new(name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            backend,
            functions: Vec::new(),
        }
    }

    /// A module with the eGTO entry points registered.
    pub fn egto(backend: Arc<dyn Backend>) -> Self {
        let mut module = Self::new("egto", backend);
        register(&mut module);
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Registers `entry` under `name`, replacing any previous definition.
    pub fn def(&mut self, name: &'static str, entry: EntryPoint, doc: &'static str) -> &mut Self {
        self.functions.retain(|f| f.name != name);
        self.functions.push(Function { name, doc, entry });
        log::trace!("{}: registered {name}", self.name);
        self
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Calls the entry point `name` with positional `args`.
    pub fn call(&self, name: &str, args: &[Arg]) -> Result<Vec<Arg>> {
        let function = self
            .function(name)
            .ok_or_else(|| EgtoError::UnknownFunction(name.to_owned()))?;
        log::debug!("{}.{name}: {} arguments", self.name, args.len());
        (function.entry)(self.backend.as_ref(), args)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("functions", &self.functions)
            .finish()
    }
}

/// Installs the eGTO entry points.
pub fn register(m: &mut Module) {
    m.def(
        "get_egto",
        egto_entry,
        "Elemental GTO representation (and its coordinate derivative when gradients is set)",
    );
    m.def(
        "get_egto_rswitch",
        egto_rswitch_entry,
        "Elemental GTO representation with a switching cutoff starting at rswitch",
    );
    m.def(
        "get_element_types_gpu2",
        element_types_entry,
        "returns atomic species according to the species tensor",
    );
}

/// Reads positional arguments in order, reporting the position of the first mismatch.
struct Args<'a> {
    function: &'static str,
    args: &'a [Arg],
    position: usize,
}

impl<'a> Args<'a> {
    fn new(function: &'static str, args: &'a [Arg], expected: usize) -> Result<Self> {
        if args.len() != expected {
            return Err(EgtoError::Argument {
                function: function.to_owned(),
                position: args.len(),
                reason: format!("expected {expected} arguments, got {}", args.len()),
            });
        }
        Ok(Self {
            function,
            args,
            position: 0,
        })
    }

    fn next(&mut self, expected: &str) -> Result<&'a Arg> {
        let arg = self.args.get(self.position).ok_or_else(|| self.error(expected, None))?;
        self.position += 1;
        Ok(arg)
    }

    fn error(&self, expected: &str, found: Option<&Arg>) -> EgtoError {
        EgtoError::Argument {
            function: self.function.to_owned(),
            position: self.position,
            reason: match found {
                Some(arg) => format!("expected {expected}, got {}", arg.kind()),
                None => format!("expected {expected}, got nothing"),
            },
        }
    }

    fn float_tensor(&mut self) -> Result<&'a Tensor<f32>> {
        match self.next("float tensor")? {
            Arg::Float(tensor) => Ok(tensor),
            other => Err(self.mismatch("float tensor", other)),
        }
    }

    fn int_tensor(&mut self) -> Result<&'a Tensor<i32>> {
        match self.next("int tensor")? {
            Arg::Int(tensor) => Ok(tensor),
            other => Err(self.mismatch("int tensor", other)),
        }
    }

    /// Floats accept integers, like a Python float parameter would.
    fn scalar(&mut self) -> Result<f32> {
        match self.next("float")? {
            Arg::Scalar(value) => Ok(*value as f32),
            Arg::Integer(value) => Ok(*value as f32),
            other => Err(self.mismatch("float", other)),
        }
    }

    fn integer(&mut self) -> Result<i32> {
        match self.next("int")? {
            Arg::Integer(value) => i32::try_from(*value).map_err(|_| EgtoError::Argument {
                function: self.function.to_owned(),
                position: self.position - 1,
                reason: format!("{value} does not fit in 32 bits"),
            }),
            other => Err(self.mismatch("int", other)),
        }
    }

    fn boolean(&mut self) -> Result<bool> {
        match self.next("bool")? {
            Arg::Bool(value) => Ok(*value),
            other => Err(self.mismatch("bool", other)),
        }
    }

    fn mismatch(&mut self, expected: &str, found: &Arg) -> EgtoError {
        self.position -= 1;
        self.error(expected, Some(found))
    }
}

fn egto_entry(backend: &dyn Backend, args: &[Arg]) -> Result<Vec<Arg>> {
    let mut a = Args::new("get_egto", args, 17)?;
    let output = get_egto(
        backend,
        a.float_tensor()?,
        a.float_tensor()?,
        a.float_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.float_tensor()?,
        a.float_tensor()?,
        a.int_tensor()?,
        a.float_tensor()?,
        a.scalar()?,
        a.integer()?,
        a.scalar()?,
        a.boolean()?,
    )?;
    Ok(output.into_vec().into_iter().map(Arg::Float).collect())
}

fn egto_rswitch_entry(backend: &dyn Backend, args: &[Arg]) -> Result<Vec<Arg>> {
    let mut a = Args::new("get_egto_rswitch", args, 18)?;
    let output = get_egto_rswitch(
        backend,
        a.float_tensor()?,
        a.float_tensor()?,
        a.float_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.int_tensor()?,
        a.float_tensor()?,
        a.float_tensor()?,
        a.int_tensor()?,
        a.float_tensor()?,
        a.scalar()?,
        a.integer()?,
        a.scalar()?,
        a.scalar()?,
        a.boolean()?,
    )?;
    Ok(output.into_vec().into_iter().map(Arg::Float).collect())
}

fn element_types_entry(backend: &dyn Backend, args: &[Arg]) -> Result<Vec<Arg>> {
    let mut a = Args::new("get_element_types_gpu2", args, 4)?;
    let element_types = get_element_types(
        backend,
        a.float_tensor()?,
        a.float_tensor()?,
        a.int_tensor()?,
        a.float_tensor()?,
    )?;
    Ok(vec![Arg::Int(element_types)])
}


// End of File
