//! Declarative deployment modules and the planning-mode graph builder.
//!
//! A module is defined by a closure that runs exactly once against a
//! [`ModuleBuilder`]. Every helper call records an action node and returns a
//! placeholder handle instead of doing real work; passing a handle to a later
//! helper call records a dependency edge. Declaration order doubles as a
//! topological order of the resulting graph.

use std::collections::BTreeSet;

use alloy_core::primitives::Address;

use crate::error::{Error, Result};
use crate::params::{ParamType, ParamValue, Parameter};

/// Handle to a parameter declared on the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamHandle {
    module: String,
    pub(crate) name: String,
}

/// Placeholder for a contract address produced by a `deploy` or
/// `contract_at` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFuture {
    module: String,
    pub(crate) index: usize,
}

/// Placeholder for the raw result of a `read` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFuture {
    module: String,
    pub(crate) index: usize,
}

/// One argument to a declared action: a literal, a parameter placeholder, or
/// a future produced by an earlier declaration.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum Arg {
    Value(ParamValue),
    Param(ParamHandle),
    Contract(ContractFuture),
    Read(ReadFuture),
}

impl From<Address> for Arg {
    fn from(addr: Address) -> Self {
        Arg::Value(ParamValue::Address(addr))
    }
}

/// The kind of on-chain operation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Deploy,
    Call,
    Read,
    ContractAt,
}

/// One declared on-chain operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Deploy {
        contract: String,
        args: Vec<Arg>,
    },
    Call {
        target: usize,
        method: String,
        args: Vec<Arg>,
    },
    Read {
        target: usize,
        method: String,
        args: Vec<Arg>,
    },
    ContractAt {
        contract: String,
        address: Address,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Deploy { .. } => ActionKind::Deploy,
            Action::Call { .. } => ActionKind::Call,
            Action::Read { .. } => ActionKind::Read,
            Action::ContractAt { .. } => ActionKind::ContractAt,
        }
    }

    /// The contract or method name the action operates on.
    pub fn label(&self) -> &str {
        match self {
            Action::Deploy { contract, .. } | Action::ContractAt { contract, .. } => contract,
            Action::Call { method, .. } | Action::Read { method, .. } => method,
        }
    }

    pub fn args(&self) -> &[Arg] {
        match self {
            Action::Deploy { args, .. } | Action::Call { args, .. } | Action::Read { args, .. } => {
                args
            }
            Action::ContractAt { .. } => &[],
        }
    }
}

/// An immutable deployment module: parameters, actions and the dependency
/// edges inferred between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    parameters: Vec<Parameter>,
    actions: Vec<Action>,
    edges: BTreeSet<(usize, usize)>,
}

impl Module {
    /// Run a definition closure in planning mode and freeze the result.
    pub fn build<F>(name: &str, definition: F) -> Result<Module>
    where
        F: FnOnce(&mut ModuleBuilder) -> Result<()>,
    {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidModuleName(name.to_string()));
        }

        let mut builder = ModuleBuilder {
            name: name.to_string(),
            parameters: Vec::new(),
            actions: Vec::new(),
            edges: BTreeSet::new(),
        };
        definition(&mut builder)?;

        tracing::debug!(
            module = %builder.name,
            actions = builder.actions.len(),
            parameters = builder.parameters.len(),
            "Module graph built"
        );

        Ok(Module {
            name: builder.name,
            parameters: builder.parameters,
            actions: builder.actions,
            edges: builder.edges,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Dependency edges as (producer, consumer) index pairs.
    pub fn edges(&self) -> &BTreeSet<(usize, usize)> {
        &self.edges
    }

    /// Stable journal key for an action: module name, declaration index and
    /// kind only, so the id is identical across runs.
    pub fn action_id(&self, index: usize) -> String {
        let action = &self.actions[index];
        format!("{}#{}:{}:{}", self.name, index, action.kind(), action.label())
    }

    /// Indices of the producers an action depends on.
    pub fn dependencies_of(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == index)
            .map(|(from, _)| *from)
            .collect()
    }
}

/// Planning context handed to the module definition closure.
pub struct ModuleBuilder {
    name: String,
    parameters: Vec<Parameter>,
    actions: Vec<Action>,
    edges: BTreeSet<(usize, usize)>,
}

impl ModuleBuilder {
    /// Declare a named parameter with an optional default.
    pub fn param(
        &mut self,
        name: &str,
        ty: ParamType,
        default: Option<ParamValue>,
    ) -> Result<ParamHandle> {
        if self.parameters.iter().any(|p| p.name == name) {
            return Err(Error::DuplicateParameter {
                name: name.to_string(),
            });
        }
        if let Some(value) = &default {
            if value.ty() != ty {
                return Err(Error::InvalidParameterType {
                    name: name.to_string(),
                    expected: match ty {
                        ParamType::Address => "address default",
                        ParamType::Uint => "uint default",
                        ParamType::String => "string default",
                        ParamType::Bool => "bool default",
                    },
                    got: format!("{:?}", value),
                });
            }
        }

        self.parameters.push(Parameter {
            name: name.to_string(),
            ty,
            default,
        });
        Ok(ParamHandle {
            module: self.name.clone(),
            name: name.to_string(),
        })
    }

    /// Declare a contract deployment. Returns a future for its address.
    pub fn deploy(&mut self, contract: &str, args: Vec<Arg>) -> Result<ContractFuture> {
        let index = self.actions.len();
        self.check_args(index, ActionKind::Deploy, contract, &args)?;
        self.actions.push(Action::Deploy {
            contract: contract.to_string(),
            args,
        });
        Ok(ContractFuture {
            module: self.name.clone(),
            index,
        })
    }

    /// Declare a state-changing method call on a previously declared contract.
    pub fn call(
        &mut self,
        target: &ContractFuture,
        method: &str,
        args: Vec<Arg>,
    ) -> Result<()> {
        let index = self.actions.len();
        self.check_future(index, ActionKind::Call, method, &target.module, target.index)?;
        self.check_args(index, ActionKind::Call, method, &args)?;
        self.edges.insert((target.index, index));
        self.actions.push(Action::Call {
            target: target.index,
            method: method.to_string(),
            args,
        });
        Ok(())
    }

    /// Declare a read-only method call. Returns a future for its result.
    pub fn read(
        &mut self,
        target: &ContractFuture,
        method: &str,
        args: Vec<Arg>,
    ) -> Result<ReadFuture> {
        let index = self.actions.len();
        self.check_future(index, ActionKind::Read, method, &target.module, target.index)?;
        self.check_args(index, ActionKind::Read, method, &args)?;
        self.edges.insert((target.index, index));
        self.actions.push(Action::Read {
            target: target.index,
            method: method.to_string(),
            args,
        });
        Ok(ReadFuture {
            module: self.name.clone(),
            index,
        })
    }

    /// Bind a contract future to a known on-chain address without deploying.
    pub fn contract_at(&mut self, contract: &str, address: Address) -> Result<ContractFuture> {
        let index = self.actions.len();
        self.actions.push(Action::ContractAt {
            contract: contract.to_string(),
            address,
        });
        Ok(ContractFuture {
            module: self.name.clone(),
            index,
        })
    }

    /// Validate every future and parameter placeholder in an argument list,
    /// recording the inferred dependency edges.
    fn check_args(
        &mut self,
        consumer: usize,
        kind: ActionKind,
        label: &str,
        args: &[Arg],
    ) -> Result<()> {
        for arg in args {
            match arg {
                Arg::Contract(f) => {
                    self.check_future(consumer, kind, label, &f.module, f.index)?;
                    self.edges.insert((f.index, consumer));
                }
                Arg::Read(f) => {
                    self.check_future(consumer, kind, label, &f.module, f.index)?;
                    self.edges.insert((f.index, consumer));
                }
                Arg::Param(p) => {
                    if p.module != self.name {
                        return Err(Error::UndeclaredFutureReference {
                            action_id: self.pending_id(consumer, kind, label),
                        });
                    }
                }
                Arg::Value(_) => {}
            }
        }
        Ok(())
    }

    /// An argument future must name a strictly earlier declaration of this
    /// module; anything else is either a foreign handle or a cycle.
    fn check_future(
        &self,
        consumer: usize,
        kind: ActionKind,
        label: &str,
        module: &str,
        producer: usize,
    ) -> Result<()> {
        if module != self.name {
            return Err(Error::UndeclaredFutureReference {
                action_id: self.pending_id(consumer, kind, label),
            });
        }
        if producer >= consumer {
            return Err(Error::CyclicDependency {
                action_id: self.pending_id(consumer, kind, label),
            });
        }
        Ok(())
    }

    fn pending_id(&self, index: usize, kind: ActionKind, label: &str) -> String {
        format!("{}#{}:{}:{}", self.name, index, kind, label)
    }
}
