pub mod operation_dag;

pub use operation_dag::{GraphError, OperationDag};
