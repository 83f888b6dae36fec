//! Production lines and the routing of wood pieces into carbon units.
//!
//! A [`ProductionLineManager`] owns the named market lines plus two special
//! lines: the landfill line, which receives disposed products, and the
//! left-in-forest line, which receives dead trees, roots and logging residues.

use crate::amounts::{AmountMap, Element};
use crate::carbon_unit::{
    CarbonUnit, CarbonUnitList, CarbonUnitStatus, ProcessUnit, UnitOrigin, UseClass,
    NEGLIGIBLE_MASS,
};
use crate::errors::{RCATError, RCATResult};
use crate::processor::{ProcessingContext, ProcessorGraph, ProcessorGraphConfig, ProcessorId};
use crate::time_table::{FloatValue, TimeTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Molar mass ratio CH4 / C
pub const CH4_PER_C: FloatValue = 16.0 / 12.0;
/// Molar mass ratio C / CO2
pub const C_PER_CO2: FloatValue = 12.0 / 44.0;

/// Line a wood piece is sent to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineTarget {
    Market(String),
    LeftInForest,
    Landfill,
}

/// Raw intake for a production line.
#[derive(Debug, Clone, PartialEq)]
pub struct WoodPiece {
    pub origin: UnitOrigin,
    pub amounts: AmountMap,
    pub target: LineTarget,
}

/// A processor graph with a designated entry processor.
#[derive(Debug, Clone)]
pub struct ProductionLine {
    name: String,
    graph: ProcessorGraph,
    entry: ProcessorId,
}

impl ProductionLine {
    pub fn new(name: impl Into<String>, graph: ProcessorGraph, entry: ProcessorId) -> Self {
        Self {
            name: name.into(),
            graph,
            entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &ProcessorGraph {
        &self.graph
    }

    pub fn entry(&self) -> ProcessorId {
        self.entry
    }

    pub fn validate(&self) -> RCATResult<()> {
        self.graph.validate()
    }

    pub fn process(
        &self,
        units: Vec<ProcessUnit>,
        context: &ProcessingContext,
    ) -> RCATResult<Vec<CarbonUnit>> {
        self.graph.process(self.entry, units, context)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLineConfig {
    pub name: String,
    /// Name of the processor receiving the wood pieces
    pub entry: String,
    #[serde(flatten)]
    pub graph: ProcessorGraphConfig,
}

impl ProductionLineConfig {
    pub fn build(&self) -> RCATResult<ProductionLine> {
        let graph = self.graph.build()?;
        let entry = graph.find(&self.entry).ok_or_else(|| {
            RCATError::Configuration(format!(
                "production line '{}' has no processor named '{}'",
                self.name, self.entry
            ))
        })?;
        Ok(ProductionLine::new(&self.name, graph, entry))
    }
}

/// Parameters of the landfill emissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandfillParameters {
    /// Fraction of the carbon released by degradable landfill material that is emitted as CH4
    /// unit: dimensionless
    pub methane_fraction: FloatValue,
    /// 100-year global warming potential of CH4
    /// unit: Mg CO2 eq / Mg CH4
    pub gwp_ch4: FloatValue,
}

impl Default for LandfillParameters {
    fn default() -> Self {
        Self {
            methane_fraction: 0.5,
            gwp_ch4: 25.0,
        }
    }
}

impl LandfillParameters {
    /// Emissions caused by `released` Mg C of degradable landfill material
    /// unit: Mg CO2 eq
    pub fn methane_emissions(&self, released: FloatValue) -> FloatValue {
        released * self.methane_fraction * CH4_PER_C * self.gwp_ch4
    }
}

/// Carbon units of a realization grouped by current status.
#[derive(Debug, Clone, Default)]
pub struct RoutedUnits {
    units: BTreeMap<CarbonUnitStatus, CarbonUnitList>,
}

impl RoutedUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: CarbonUnit) -> RCATResult<()> {
        self.units
            .entry(unit.current_status())
            .or_default()
            .add(unit)
    }

    pub fn extend<I: IntoIterator<Item = CarbonUnit>>(&mut self, units: I) -> RCATResult<()> {
        for unit in units {
            self.add(unit)?;
        }
        Ok(())
    }

    pub fn units(&self, status: CarbonUnitStatus) -> impl Iterator<Item = &CarbonUnit> {
        self.units.get(&status).into_iter().flat_map(|list| list.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CarbonUnit> {
        self.units.values().flat_map(|list| list.iter())
    }

    pub fn len(&self) -> usize {
        self.units.values().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn actualize(&mut self, time_table: &TimeTable) -> RCATResult<()> {
        self.units
            .values_mut()
            .try_for_each(|list| list.actualize(time_table))
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }
}

#[derive(Debug, Clone)]
pub struct ProductionLineManager {
    lines: BTreeMap<String, ProductionLine>,
    landfill: ProductionLine,
    left_in_forest: ProductionLine,
    default_line: Option<String>,
}

impl ProductionLineManager {
    pub fn new(landfill: ProductionLine, left_in_forest: ProductionLine) -> Self {
        Self {
            lines: BTreeMap::new(),
            landfill,
            left_in_forest,
            default_line: None,
        }
    }

    pub fn add_line(&mut self, line: ProductionLine) {
        self.lines.insert(line.name.clone(), line);
    }

    pub fn with_line(mut self, line: ProductionLine) -> Self {
        self.add_line(line);
        self
    }

    /// Market line used for trees that do not name one
    pub fn set_default_line(&mut self, name: impl Into<String>) -> RCATResult<()> {
        let name = name.into();
        self.line(&name)?;
        self.default_line = Some(name);
        Ok(())
    }

    pub fn default_line(&self) -> Option<&str> {
        self.default_line.as_deref()
    }

    pub fn line(&self, name: &str) -> RCATResult<&ProductionLine> {
        self.lines
            .get(name)
            .ok_or_else(|| RCATError::UnknownProductionLine(name.to_string()))
    }

    pub fn line_names(&self) -> impl Iterator<Item = &str> {
        self.lines.keys().map(String::as_str)
    }

    pub fn landfill(&self) -> &ProductionLine {
        &self.landfill
    }

    pub fn left_in_forest(&self) -> &ProductionLine {
        &self.left_in_forest
    }

    /// Resolve the market line of a tree, falling back on the default line.
    pub fn market_target(&self, line: Option<&str>) -> RCATResult<LineTarget> {
        match line.or(self.default_line.as_deref()) {
            Some(name) => {
                self.line(name)?;
                Ok(LineTarget::Market(name.to_string()))
            }
            None => Err(RCATError::Configuration(
                "no production line given and no default line configured".to_string(),
            )),
        }
    }

    /// Validate every line.
    pub fn validate(&self) -> RCATResult<()> {
        for line in self.lines.values() {
            line.validate()?;
        }
        self.landfill.validate()?;
        self.left_in_forest.validate()
    }

    fn target_line(&self, target: &LineTarget) -> RCATResult<&ProductionLine> {
        match target {
            LineTarget::Market(name) => self.line(name),
            LineTarget::LeftInForest => Ok(&self.left_in_forest),
            LineTarget::Landfill => Ok(&self.landfill),
        }
    }

    /// Send wood pieces through their lines.
    pub fn route(
        &self,
        pieces: Vec<WoodPiece>,
        context: &ProcessingContext,
        routed: &mut RoutedUnits,
    ) -> RCATResult<()> {
        let mut grouped: BTreeMap<LineTarget, Vec<ProcessUnit>> = BTreeMap::new();
        for piece in pieces {
            grouped
                .entry(piece.target)
                .or_default()
                .push(ProcessUnit::new(piece.origin, piece.amounts));
        }

        for (target, units) in grouped {
            let line = self.target_line(&target)?;
            debug!(line = %line.name, units = units.len(), "routing wood pieces");
            let output = line.process(units, context)?;
            check_line_output(&target, &output)?;
            routed.extend(output)?;
        }
        Ok(())
    }

    /// Send the carbon released each year by end-use products to the landfill line.
    ///
    /// Products must be actualized. The landfill units are created at the index
    /// where the carbon is released and are actualized before returning. Energy
    /// products are burnt and never reach the landfill.
    pub fn dispose_to_landfill(
        &self,
        routed: &mut RoutedUnits,
        time_table: &TimeTable,
        context: &ProcessingContext,
    ) -> RCATResult<()> {
        let mut disposed = vec![];
        for status in [CarbonUnitStatus::EndUseWoodProduct, CarbonUnitStatus::Recycled] {
            for unit in routed.units(status) {
                if unit.use_class() == UseClass::Energy || unit.initial_carbon() <= 0.0 {
                    continue;
                }
                for index in (unit.creation_index() + 1)..time_table.len() {
                    let released = unit.released_carbon(index)?;
                    if released < NEGLIGIBLE_MASS {
                        continue;
                    }
                    let mut amounts = unit
                        .initial_amounts()
                        .scaled(released / unit.initial_carbon());
                    amounts.set(Element::EmissionsCO2Eq, 0.0);
                    let mut process_unit = ProcessUnit::new(
                        UnitOrigin {
                            creation_index: index,
                            ..unit.origin().clone()
                        },
                        amounts,
                    );
                    process_unit.status_log = unit.status_log().to_vec();
                    disposed.push(process_unit);
                }
            }
        }
        if disposed.is_empty() {
            return Ok(());
        }

        debug!(units = disposed.len(), "disposing products to landfill");
        let mut output = self.landfill.process(disposed, context)?;
        check_line_output(&LineTarget::Landfill, &output)?;
        for unit in output.iter_mut() {
            unit.actualize(time_table)?;
        }
        routed.extend(output)
    }
}

/// The special lines may only yield their own kind of units.
fn check_line_output(target: &LineTarget, output: &[CarbonUnit]) -> RCATResult<()> {
    let allowed = |status: CarbonUnitStatus| match target {
        LineTarget::Market(_) => true,
        LineTarget::Landfill => status.is_landfill(),
        LineTarget::LeftInForest => status == CarbonUnitStatus::DeadWood,
    };
    match output.iter().find(|unit| !allowed(unit.current_status())) {
        Some(unit) => Err(RCATError::Consistency(format!(
            "{:?} line produced a unit with status {}",
            target,
            unit.current_status()
        ))),
        None => Ok(()),
    }
}

/// Configuration of every line of a [`ProductionLineManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLineManagerConfig {
    #[serde(default)]
    pub default_line: Option<String>,
    #[serde(default)]
    pub lines: Vec<ProductionLineConfig>,
    pub landfill: ProductionLineConfig,
    pub left_in_forest: ProductionLineConfig,
}

impl ProductionLineManagerConfig {
    pub fn from_toml(content: &str) -> RCATResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn build(&self) -> RCATResult<ProductionLineManager> {
        let mut manager =
            ProductionLineManager::new(self.landfill.build()?, self.left_in_forest.build()?);
        for line in &self.lines {
            if manager.lines.contains_key(&line.name) {
                return Err(RCATError::Configuration(format!(
                    "production line '{}' is declared more than once",
                    line.name
                )));
            }
            manager.add_line(line.build()?);
        }
        if let Some(name) = &self.default_line {
            manager.set_default_line(name)?;
        }
        Ok(manager)
    }
}
