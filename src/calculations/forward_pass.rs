use super::{PassResult, Placer, ScheduleWarning, StepMeter, manual_window};
use crate::calendar::CalendarService;
use crate::config::RunOptions;
use crate::constraint::Direction;
use crate::engine::ScheduleError;
use crate::graph::OperationDag;
use crate::operation::{Operation, OperationId};
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::collections::HashMap;

/// ASAP pass: every operation starts as early as its predecessors, the job
/// release and its calendar allow.
pub struct ForwardPass<'a> {
    operations: &'a [Operation],
    dag: &'a OperationDag,
    calendars: &'a CalendarService,
    options: &'a RunOptions,
}

impl<'a> ForwardPass<'a> {
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
        release: NaiveDateTime,
        meter: &mut StepMeter,
    ) -> Result<PassResult, ScheduleError> {
        let by_id: HashMap<OperationId, &Operation> =
            self.operations.iter().map(|op| (op.id, op)).collect();
        let placer = Placer::new(self.calendars, self.options.config.strict);
        let mut result = PassResult::default();

        for op_id in self.dag.topological_order(Direction::Forward) {
            meter.checkpoint(&self.options.cancellation)?;
            let Some(operation) = by_id.get(&op_id).copied() else {
                continue;
            };

            // Latest finishing predecessor (FS semantics); ties go to the lowest id.
            let blocking = self
                .dag
                .predecessors(op_id)
                .into_iter()
                .filter_map(|pred| result.windows.get(&pred).map(|w| (w.end, Reverse(pred))))
                .max()
                .map(|(end, Reverse(pred))| (end, pred));

            if operation.is_manually_scheduled {
                if let Some(window) = manual_window(operation, &mut result.warnings) {
                    if let Some((pred_end, pred_id)) = blocking {
                        if window.start < pred_end {
                            result.warnings.push(ScheduleWarning::ManualPrecedenceConflict {
                                operation_id: op_id,
                                neighbor_id: pred_id,
                            });
                        }
                    }
                    result.windows.insert(op_id, window);
                }
                continue;
            }

            let earliest = blocking.map_or(release, |(pred_end, _)| pred_end.max(release));
            let window = placer.place(
                operation,
                earliest,
                Direction::Forward,
                meter,
                &mut result.warnings,
            )?;
            result.windows.insert(op_id, window);
        }

        Ok(result)
    }
}
