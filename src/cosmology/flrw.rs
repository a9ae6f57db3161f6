//! The `Cosmology` interface and the Lambda-CDM pair implementing it.
//!
//! Instances are immutable: fields are private and `clone_with` builds a
//! modified copy instead of mutating.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Free-form metadata, e.g. a literature reference.
pub type Meta = BTreeMap<String, String>;

/// `|Ω_k|` below this counts as flat.
const FLAT_TOLERANCE: f64 = 1e-12;

/// Hubble constant and present-day density parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Densities {
    /// km/s/Mpc
    pub h0: f64,
    pub om0: f64,
    pub ode0: f64,
}

impl Densities {
    fn matches(&self, other: &Densities) -> bool {
        close(self.h0, other.h0) && close(self.om0, other.om0) && close(self.ode0, other.ode0)
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

/// Requested modifications for [`Cosmology::clone_with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CosmologyChanges {
    /// New name. When anything changes and this is `None`, the copy is named
    /// `"<old name> (modified)"`.
    pub name: Option<String>,
    /// Merged into the existing metadata, new keys winning.
    pub meta: Meta,
    /// Constructor parameters to replace, by name (`H0`, `Om0`, ...).
    pub parameters: BTreeMap<String, f64>,
}

impl CosmologyChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.meta.is_empty() && self.parameters.is_empty()
    }
}

pub trait Cosmology: fmt::Debug + Send + Sync {
    /// Class name; also the tag used when serializing.
    fn class_name(&self) -> &'static str;

    fn name(&self) -> Option<&str>;

    fn meta(&self) -> &Meta;

    /// Whether space is flat. No default: every cosmology has to decide.
    fn is_flat(&self) -> bool;

    /// Constructor parameters, in constructor order.
    fn parameters(&self) -> Vec<(&'static str, f64)>;

    fn densities(&self) -> Densities;

    /// A new instance of the same class built from `values` (in
    /// `parameters()` order).
    fn rebuild(&self, name: Option<String>, meta: Meta, values: &[f64]) -> Result<Box<dyn Cosmology>, AppError>;

    fn to_record(&self) -> CosmologyRecord;

    /// Copy with updated parameters, name or metadata. The class never
    /// changes, so a flat cosmology cannot be given a dark energy density.
    fn clone_with(&self, changes: &CosmologyChanges) -> Result<Box<dyn Cosmology>, AppError> {
        let mut params = self.parameters();
        for (key, &value) in &changes.parameters {
            let slot = params
                .iter_mut()
                .find(|(name, _)| *name == key.as_str())
                .ok_or_else(|| AppError::input(format!("{} has no parameter '{key}'.", self.class_name())))?;
            slot.1 = value;
        }

        let name = match &changes.name {
            Some(name) => Some(name.clone()),
            None if changes.is_empty() => self.name().map(str::to_string),
            None => self.name().map(|n| format!("{n} (modified)")),
        };

        let mut meta = self.meta().clone();
        meta.extend(changes.meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        let values: Vec<f64> = params.into_iter().map(|(_, v)| v).collect();
        self.rebuild(name, meta, &values)
    }

    /// Same physical content. Instances of one class compare parameters;
    /// across classes the densities decide, so a Lambda-CDM with
    /// `Om0 + Ode0 = 1` is equivalent to the flat class with the same `H0`
    /// and `Om0`. Names and metadata are ignored.
    fn is_equivalent(&self, other: &dyn Cosmology) -> bool {
        if self.class_name() == other.class_name() {
            return self.parameters() == other.parameters();
        }
        self.is_flat() == other.is_flat() && self.densities().matches(&other.densities())
    }

    /// Same class, same parameters, same name. Metadata is ignored.
    fn same_as(&self, other: &dyn Cosmology) -> bool {
        self.class_name() == other.class_name() && self.is_equivalent(other) && self.name() == other.name()
    }
}

fn validate_common(h0: f64, om0: f64) -> Result<(), AppError> {
    if !(h0.is_finite() && h0 > 0.0) {
        return Err(AppError::input(format!("H0 must be finite and positive, got {h0}.")));
    }
    if !(om0.is_finite() && om0 >= 0.0) {
        return Err(AppError::input(format!("Om0 must be finite and non-negative, got {om0}.")));
    }
    Ok(())
}

/// Lambda-CDM with free curvature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaCdm {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    meta: Meta,
    #[serde(rename = "H0")]
    h0: f64,
    #[serde(rename = "Om0")]
    om0: f64,
    #[serde(rename = "Ode0")]
    ode0: f64,
}

impl LambdaCdm {
    pub fn new(h0: f64, om0: f64, ode0: f64) -> Result<Self, AppError> {
        let c = Self {
            name: None,
            meta: Meta::new(),
            h0,
            om0,
            ode0,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    fn validate(&self) -> Result<(), AppError> {
        validate_common(self.h0, self.om0)?;
        if !self.ode0.is_finite() {
            return Err(AppError::input(format!("Ode0 must be finite, got {}.", self.ode0)));
        }
        Ok(())
    }

    pub fn h0(&self) -> f64 {
        self.h0
    }

    pub fn om0(&self) -> f64 {
        self.om0
    }

    pub fn ode0(&self) -> f64 {
        self.ode0
    }

    /// Curvature density, `1 - Om0 - Ode0`.
    pub fn ok0(&self) -> f64 {
        1.0 - self.om0 - self.ode0
    }
}

impl Cosmology for LambdaCdm {
    fn class_name(&self) -> &'static str {
        "LambdaCDM"
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn is_flat(&self) -> bool {
        self.ok0().abs() < FLAT_TOLERANCE
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("H0", self.h0), ("Om0", self.om0), ("Ode0", self.ode0)]
    }

    fn densities(&self) -> Densities {
        Densities {
            h0: self.h0,
            om0: self.om0,
            ode0: self.ode0,
        }
    }

    fn rebuild(&self, name: Option<String>, meta: Meta, values: &[f64]) -> Result<Box<dyn Cosmology>, AppError> {
        let &[h0, om0, ode0] = values else {
            return Err(AppError::input(format!("LambdaCDM takes 3 parameters, {} given.", values.len())));
        };
        let mut c = LambdaCdm::new(h0, om0, ode0)?.with_meta(meta);
        c.name = name;
        Ok(Box::new(c))
    }

    fn to_record(&self) -> CosmologyRecord {
        CosmologyRecord::LambdaCdm(self.clone())
    }
}

impl PartialEq for LambdaCdm {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Spatially flat Lambda-CDM: `Ode0` follows from `Om0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatLambdaCdm {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    meta: Meta,
    #[serde(rename = "H0")]
    h0: f64,
    #[serde(rename = "Om0")]
    om0: f64,
}

impl FlatLambdaCdm {
    pub fn new(h0: f64, om0: f64) -> Result<Self, AppError> {
        validate_common(h0, om0)?;
        Ok(Self {
            name: None,
            meta: Meta::new(),
            h0,
            om0,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn h0(&self) -> f64 {
        self.h0
    }

    pub fn om0(&self) -> f64 {
        self.om0
    }

    pub fn ode0(&self) -> f64 {
        1.0 - self.om0
    }
}

impl Cosmology for FlatLambdaCdm {
    fn class_name(&self) -> &'static str {
        "FlatLambdaCDM"
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn is_flat(&self) -> bool {
        true
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("H0", self.h0), ("Om0", self.om0)]
    }

    fn densities(&self) -> Densities {
        Densities {
            h0: self.h0,
            om0: self.om0,
            ode0: self.ode0(),
        }
    }

    fn rebuild(&self, name: Option<String>, meta: Meta, values: &[f64]) -> Result<Box<dyn Cosmology>, AppError> {
        let &[h0, om0] = values else {
            return Err(AppError::input(format!("FlatLambdaCDM takes 2 parameters, {} given.", values.len())));
        };
        let mut c = FlatLambdaCdm::new(h0, om0)?.with_meta(meta);
        c.name = name;
        Ok(Box::new(c))
    }

    fn to_record(&self) -> CosmologyRecord {
        CosmologyRecord::FlatLambdaCdm(self.clone())
    }
}

impl PartialEq for FlatLambdaCdm {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Serialized form of any cosmology, tagged by class name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CosmologyRecord {
    #[serde(rename = "LambdaCDM")]
    LambdaCdm(LambdaCdm),
    #[serde(rename = "FlatLambdaCDM")]
    FlatLambdaCdm(FlatLambdaCdm),
}

impl CosmologyRecord {
    /// Validate and box the decoded cosmology.
    pub fn into_cosmology(self) -> Result<Box<dyn Cosmology>, AppError> {
        match self {
            CosmologyRecord::LambdaCdm(c) => {
                c.validate()?;
                Ok(Box::new(c))
            }
            CosmologyRecord::FlatLambdaCdm(c) => {
                validate_common(c.h0, c.om0)?;
                Ok(Box::new(c))
            }
        }
    }
}

/// Planck 2018 (TT,TE,EE+lowE+lensing+BAO), without massive neutrinos.
pub fn planck18() -> FlatLambdaCdm {
    FlatLambdaCdm {
        name: Some("Planck18".to_string()),
        meta: Meta::from([(
            "reference".to_string(),
            "Planck Collaboration 2018, A&A 641, A6 (Table 2, TT,TE,EE+lowE+lensing+BAO)".to_string(),
        )]),
        h0: 67.66,
        om0: 0.30966,
    }
}
