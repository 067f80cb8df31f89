//! Data model shared by all pipeline stages

pub mod factor;
pub mod process;
pub mod record;
pub mod substance;

pub use factor::{Factor, FactorKey, impact_label};
pub use process::{
    ActivityRecord, ActivityType, CharacterisationRecord, ElementaryExchangeRecord, Exchange,
    Process, Product, TechnologyLevel, process_id,
};
pub use record::{Cas, CasFormatError, NormalizedRecord, RawFlowRecord};
pub use substance::{
    Name, NameHasScheme, NameId, NewSubstance, Scheme, SchemeId, Stressor, Substance, SubstanceId,
};
