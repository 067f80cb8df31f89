//! Matrix assembly from a validated flow graph

pub mod leontief;
pub mod ordering;
pub mod sparse;
pub mod sut;

pub use leontief::{LeontiefSystem, apply_waste_sign_convention, assemble_leontief};
pub use ordering::{order_processes, order_products, order_stressors};
pub use sparse::{LabelledMatrix, Triplet};
pub use sut::{SupplyUseSystem, assemble_sut, use_row_label};
