//! # Optimization Methods
//!
//! `Method` names one of the five update rules together with its
//! hyperparameters. It can be deserialized (tagged by `"method"`) or parsed
//! from the compact form `<name>[-<key>_<value>]*`:
//!
//! ```
//! use rtorch_optim::optim::Method;
//!
//! let method: Method = "adam-lr_0.0005-epsilon_1e-7".parse().unwrap();
//! assert_eq!(method.name(), "adam");
//! assert_eq!(method.learning_rate(), Some(0.0005));
//! ```

use super::adadelta::AdadeltaConfig;
use super::adagrad::AdagradConfig;
use super::adam::AdamConfig;
use super::error::Result;
use super::momentum::MomentumConfig;
use super::sgd::SgdConfig;
use crate::tensor::TensorData;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Method {
    #[serde(rename = "sgd")]
    GradientDescent(SgdConfig),
    #[serde(rename = "sgdmomentum", alias = "momentum")]
    Momentum(MomentumConfig),
    #[serde(rename = "adagrad")]
    Adagrad(AdagradConfig),
    #[serde(rename = "adadelta")]
    Adadelta(AdadeltaConfig),
    #[serde(rename = "adam")]
    Adam(AdamConfig),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseMethodError {
    #[error("Unknown optimization method '{0}' (expected sgd, sgdmomentum, adagrad, adadelta or adam)")]
    UnknownMethod(String),
    #[error("Malformed parameter '{0}', expected <name>_<value>")]
    MalformedParameter(String),
    #[error("Method '{method}' has no parameter '{key}'")]
    UnknownParameter { method: &'static str, key: String },
    #[error("Invalid value '{value}' for parameter '{key}'")]
    InvalidNumber { key: String, value: String },
}

impl Method {
    /// The method with its default hyperparameters, looked up by name.
    pub fn from_name(name: &str) -> Option<Method> {
        let method = match name {
            "sgd" => Method::GradientDescent(SgdConfig::default()),
            "sgdmomentum" | "momentum" => Method::Momentum(MomentumConfig::default()),
            "adagrad" => Method::Adagrad(AdagradConfig::default()),
            "adadelta" => Method::Adadelta(AdadeltaConfig::default()),
            "adam" => Method::Adam(AdamConfig::default()),
            _ => return None,
        };
        Some(method)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::GradientDescent(_) => "sgd",
            Method::Momentum(_) => "sgdmomentum",
            Method::Adagrad(_) => "adagrad",
            Method::Adadelta(_) => "adadelta",
            Method::Adam(_) => "adam",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Method::GradientDescent(config) => config.validate(),
            Method::Momentum(config) => config.validate(),
            Method::Adagrad(config) => config.validate(),
            Method::Adadelta(config) => config.validate(),
            Method::Adam(config) => config.validate(),
        }
    }

    /// `None` for Adadelta, which derives its step size from its accumulators.
    pub fn learning_rate(&self) -> Option<TensorData> {
        match self {
            Method::GradientDescent(config) => Some(config.lr),
            Method::Momentum(config) => Some(config.lr),
            Method::Adagrad(config) => Some(config.lr),
            Method::Adadelta(_) => None,
            Method::Adam(config) => Some(config.lr),
        }
    }

    /// Hyperparameters in display order.
    pub fn hyperparameters(&self) -> Vec<(&'static str, TensorData)> {
        match self {
            Method::GradientDescent(c) => vec![("lr", c.lr)],
            Method::Momentum(c) => vec![("lr", c.lr), ("momentum", c.momentum)],
            Method::Adagrad(c) => vec![("lr", c.lr), ("epsilon", c.epsilon)],
            Method::Adadelta(c) => vec![("rho", c.rho), ("epsilon", c.epsilon)],
            Method::Adam(c) => vec![
                ("lr", c.lr),
                ("beta1", c.beta1),
                ("beta2", c.beta2),
                ("epsilon", c.epsilon),
            ],
        }
    }

    fn set(&mut self, key: &str, value: TensorData) -> std::result::Result<(), ParseMethodError> {
        let method = self.name();
        let slot = match (self, key) {
            (Method::GradientDescent(c), "lr") => &mut c.lr,
            (Method::Momentum(c), "lr") => &mut c.lr,
            (Method::Momentum(c), "momentum") => &mut c.momentum,
            (Method::Adagrad(c), "lr") => &mut c.lr,
            (Method::Adagrad(c), "epsilon") => &mut c.epsilon,
            (Method::Adadelta(c), "rho") => &mut c.rho,
            (Method::Adadelta(c), "epsilon") => &mut c.epsilon,
            (Method::Adam(c), "lr") => &mut c.lr,
            (Method::Adam(c), "beta1") => &mut c.beta1,
            (Method::Adam(c), "beta2") => &mut c.beta2,
            (Method::Adam(c), "epsilon") => &mut c.epsilon,
            _ => {
                return Err(ParseMethodError::UnknownParameter {
                    method,
                    key: key.to_string(),
                })
            }
        };
        *slot = value;
        Ok(())
    }
}

/// Splits `lr_0.01-epsilon_1e-8` into key/value pairs. A token without `_`
/// continues the previous value, so negative exponents survive the split.
fn split_pairs(text: &str) -> std::result::Result<Vec<(String, String)>, ParseMethodError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for token in text.split('-') {
        match token.split_once('_') {
            Some((key, value)) if !key.is_empty() => pairs.push((key.to_string(), value.to_string())),
            Some(_) => return Err(ParseMethodError::MalformedParameter(token.to_string())),
            None => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push('-');
                    value.push_str(token);
                }
                None => return Err(ParseMethodError::MalformedParameter(token.to_string())),
            },
        }
    }
    Ok(pairs)
}

impl FromStr for Method {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.split_once('-') {
            Some((name, rest)) => (name, Some(rest)),
            None => (s, None),
        };
        let mut method =
            Method::from_name(name).ok_or_else(|| ParseMethodError::UnknownMethod(name.to_string()))?;

        if let Some(rest) = rest {
            for (key, value) in split_pairs(rest)? {
                let number = value
                    .parse::<TensorData>()
                    .map_err(|_| ParseMethodError::InvalidNumber {
                        key: key.clone(),
                        value: value.clone(),
                    })?;
                method.set(&key, number)?;
            }
        }
        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        for (key, value) in self.hyperparameters() {
            write!(f, "-{}_{}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_uses_defaults() {
        assert_eq!(
            "adadelta".parse::<Method>().unwrap(),
            Method::Adadelta(AdadeltaConfig::default())
        );
        assert_eq!(
            "momentum".parse::<Method>().unwrap(),
            Method::Momentum(MomentumConfig::default())
        );
    }

    #[test]
    fn parses_leading_dot_and_negative_exponent() {
        let method: Method = "sgd-lr_.005".parse().unwrap();
        assert_eq!(method, Method::GradientDescent(SgdConfig { lr: 0.005 }));

        let method: Method = "adagrad-lr_0.1-epsilon_1e-8".parse().unwrap();
        assert_eq!(
            method,
            Method::Adagrad(AdagradConfig {
                lr: 0.1,
                epsilon: 1e-8
            })
        );
    }

    #[test]
    fn display_round_trips() {
        let method = Method::Adam(AdamConfig {
            lr: 0.002,
            beta1: 0.8,
            beta2: 0.99,
            epsilon: 1e-7,
        });
        let text = method.to_string();
        assert!(text.starts_with("adam-lr_0.002-beta1_0.8"));
        assert_eq!(text.parse::<Method>().unwrap(), method);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(
            "rmsprop".parse::<Method>().unwrap_err(),
            ParseMethodError::UnknownMethod("rmsprop".into())
        );
        assert!(matches!(
            "adadelta-lr_0.1".parse::<Method>().unwrap_err(),
            ParseMethodError::UnknownParameter { method: "adadelta", .. }
        ));
        assert!(matches!(
            "adam-lr_fast".parse::<Method>().unwrap_err(),
            ParseMethodError::InvalidNumber { .. }
        ));
        assert!(matches!(
            "adam-0.1".parse::<Method>().unwrap_err(),
            ParseMethodError::MalformedParameter(_)
        ));
    }
}
