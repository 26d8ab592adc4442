use super::contract::{Contract, ContractKind};
use crate::error::ProxyError;
use crate::MPMC::Disruptor;

/// Which preconditions proxy creation enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Contract must be tagged with `#[disruptor_proxy]`. Off by default.
    pub require_contract_tag: bool,
    /// Disruptor must have an exception handler. On by default.
    pub require_exception_handler: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_contract_tag: false,
            require_exception_handler: true,
        }
    }
}

impl ValidationConfig {
    pub fn new(require_contract_tag: bool, require_exception_handler: bool) -> Self {
        Self {
            require_contract_tag,
            require_exception_handler,
        }
    }

    /// No checks beyond the contract being a trait.
    pub fn lenient() -> Self {
        Self::new(false, false)
    }
}

/// Preconditions checked before a proxy is handed out.
pub trait Validator {
    fn validate_contract<C: Contract>(&self) -> Result<(), ProxyError>;

    fn validate_exception_handler<E>(&self, disruptor: &Disruptor<E>) -> Result<(), ProxyError>
    where
        E: Send + 'static;

    fn validate_all<C, E>(&self, disruptor: &Disruptor<E>) -> Result<(), ProxyError>
    where
        C: Contract,
        E: Send + 'static,
    {
        self.validate_contract::<C>()?;
        self.validate_exception_handler(disruptor)
    }
}

/// Checks proxy preconditions against a `ValidationConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurableValidator {
    config: ValidationConfig,
}

impl ConfigurableValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ValidationConfig {
        self.config
    }
}

impl Validator for ConfigurableValidator {
    fn validate_contract<C: Contract>(&self) -> Result<(), ProxyError> {
        if C::kind() != ContractKind::Capability {
            return Err(ProxyError::NotACapabilitySet { contract: C::name() });
        }
        if self.config.require_contract_tag && !C::is_tagged() {
            return Err(ProxyError::MissingContractTag { contract: C::name() });
        }
        Ok(())
    }

    fn validate_exception_handler<E>(&self, disruptor: &Disruptor<E>) -> Result<(), ProxyError>
    where
        E: Send + 'static,
    {
        if self.config.require_exception_handler && !disruptor.has_exception_handler() {
            return Err(ProxyError::MissingExceptionHandler);
        }
        Ok(())
    }
}
