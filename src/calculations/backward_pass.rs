use super::{PassResult, Placer, ScheduleWarning, StepMeter, manual_window};
use crate::calendar::CalendarService;
use crate::config::RunOptions;
use crate::constraint::Direction;
use crate::engine::ScheduleError;
use crate::graph::OperationDag;
use crate::operation::{Operation, OperationId};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// ALAP pass: every operation finishes as late as its successors, the job
/// due date and its calendar allow.
pub struct BackwardPass<'a> {
    operations: &'a [Operation],
    dag: &'a OperationDag,
    calendars: &'a CalendarService,
    options: &'a RunOptions,
}

impl<'a> BackwardPass<'a> {
    pub fn new(
        operations: &'a [Operation],
        dag: &'a OperationDag,
        calendars: &'a CalendarService,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            operations,
            dag,
            calendars,
            options,
        }
    }

    pub fn execute(
        &self,
        due: NaiveDateTime,
        meter: &mut StepMeter,
    ) -> Result<PassResult, ScheduleError> {
        let by_id: HashMap<OperationId, &Operation> =
            self.operations.iter().map(|op| (op.id, op)).collect();
        let placer = Placer::new(self.calendars, self.options.config.strict);
        let mut result = PassResult::default();

        for op_id in self.dag.topological_order(Direction::Backward) {
            meter.checkpoint(&self.options.cancellation)?;
            let Some(operation) = by_id.get(&op_id).copied() else {
                continue;
            };

            // Earliest starting successor; ties go to the lowest id.
            let blocking = self
                .dag
                .successors(op_id)
                .into_iter()
                .filter_map(|succ| result.windows.get(&succ).map(|w| (w.start, succ)))
                .min();

            if operation.is_manually_scheduled {
                if let Some(window) = manual_window(operation, &mut result.warnings) {
                    if let Some((succ_start, succ_id)) = blocking {
                        if window.end > succ_start {
                            result.warnings.push(ScheduleWarning::ManualPrecedenceConflict {
                                operation_id: op_id,
                                neighbor_id: succ_id,
                            });
                        }
                    }
                    result.windows.insert(op_id, window);
                }
                continue;
            }

            let latest = blocking.map_or(due, |(succ_start, _)| succ_start.min(due));
            let window = placer.place(
                operation,
                latest,
                Direction::Backward,
                meter,
                &mut result.warnings,
            )?;
            result.windows.insert(op_id, window);
        }

        Ok(result)
    }
}
