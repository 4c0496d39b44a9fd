//! Pouch Quote prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    advisor::{EconomicSuggestion, SuggestionReason, SuggestionRecord, suggest_economic_quantity},
    batch::{
        BatchComparison, BatchEntry, BatchEntryRecord, Comparison, PriceTrend, calculate_batch,
        calculate_batch_yielding,
    },
    consistency::ConsistencyError,
    costs::CostBreakdown,
    fixtures::{Fixture, FixtureError},
    length::{BatchPlan, LengthPlan},
    parallel::{ParallelOption, parallel_options},
    quote::{QuoteError, QuoteRecord, QuoteResult, calculate_quote},
    request::{ColorsInput, LayerInput, PrintingInput, QuoteRequest},
    specification::{
        BagType, PackagingSpecification, PostProcessing, PostProcessingOption, Quantities,
        ValidationError, normalize,
    },
    tables::{PricingTable, TableError},
    worker::{BatchPayload, BatchWorker, WorkerError, WorkerRequest, WorkerResponse},
    yields::{GeometryError, YieldProfile},
};
