//! Spark engine adapter: a session/context pair, partitioned native frames,
//! schema-less row RDDs and the engine that distributes local data over them.
//!
//! Nothing is registered until [`register`] is called.

mod dataframe;
mod engine;
mod registry;
mod session;

pub use dataframe::{RowRdd, SparkDataFrame, SparkNativeFrame};
pub use engine::SparkExecutionEngine;
pub use registry::{register, SPARK_SQL_NAMESPACE};
pub use session::{SparkContext, SparkSession, SparkSessionBuilder, SPARK_DEFAULT_PARALLELISM};
