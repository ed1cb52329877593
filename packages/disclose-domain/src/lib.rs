pub mod decision;
pub mod model;
pub mod summary;

pub use decision::{DecisionPolicy, LabelDecision, RankedJudgment, decide_label};
pub use model::{
	Chunk, Disclosure, Judgment, JudgmentSource, Label, RankedCandidate, RetrievalCandidate,
};
pub use summary::{CompanyLabelDetail, CompanySummary, label_details, summarize_company};
