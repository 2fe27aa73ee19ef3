//! Plugin hooks into the task builders.
//!
//! Plugins may decorate the launch payload (labels, extra environment,
//! sidecar wiring) but can never reject it: the hooks are infallible and
//! applied in registration order.

use armada_mesos::{ExecutorInfo, TaskGroupInfo, TaskInfo};

use crate::spec::RunSpec;

/// A plugin-authored mutation of the launch payload.
///
/// Both hooks default to no-ops; a plugin overrides the ones it cares about.
pub trait RunSpecTaskProcessor: Send + Sync {
    /// Mutates a single-task launch payload (apps).
    fn task_info(&self, run_spec: &RunSpec, task_info: &mut TaskInfo) {
        let _ = (run_spec, task_info);
    }

    /// Mutates a task-group launch payload (pods).
    fn task_group(
        &self,
        run_spec: &RunSpec,
        executor: &mut ExecutorInfo,
        task_group: &mut TaskGroupInfo,
    ) {
        let _ = (run_spec, executor, task_group);
    }
}

/// Applies every processor to an app payload, in registration order.
pub fn apply_task_processors(
    processors: &[Box<dyn RunSpecTaskProcessor>],
    run_spec: &RunSpec,
    task_info: &mut TaskInfo,
) {
    for processor in processors {
        processor.task_info(run_spec, task_info);
    }
}

/// Applies every processor to a pod payload, in registration order.
pub fn apply_task_group_processors(
    processors: &[Box<dyn RunSpecTaskProcessor>],
    run_spec: &RunSpec,
    executor: &mut ExecutorInfo,
    task_group: &mut TaskGroupInfo,
) {
    for processor in processors {
        processor.task_group(run_spec, executor, task_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_id::{AgentId, RunSpecId, TaskId};
    use std::collections::BTreeMap;

    struct LabelStamp {
        key: &'static str,
        value: &'static str,
    }

    impl RunSpecTaskProcessor for LabelStamp {
        fn task_info(&self, _run_spec: &RunSpec, task_info: &mut TaskInfo) {
            task_info
                .labels
                .insert(self.key.to_string(), self.value.to_string());
        }
    }

    #[test]
    fn test_processors_apply_in_registration_order() {
        let run_spec = crate::spec::RunSpec::App(crate::spec::AppSpec {
            id: RunSpecId::parse("/prod/web").unwrap(),
            version: chrono::Utc::now(),
            cmd: None,
            args: vec![],
            env: BTreeMap::new(),
            resources: crate::spec::ResourceDemand::default(),
            image: None,
            endpoints: vec![],
            health_check: None,
            volumes: vec![],
            accepted_resource_roles: None,
            constraints: vec![],
        });

        let mut task_info = TaskInfo {
            task_id: TaskId::for_run_spec(run_spec.id()),
            name: "prod.web".to_string(),
            agent_id: AgentId::new("agent-1"),
            resources: vec![],
            command: None,
            container: None,
            health_check: None,
            labels: BTreeMap::new(),
        };

        let processors: Vec<Box<dyn RunSpecTaskProcessor>> = vec![
            Box::new(LabelStamp {
                key: "tier",
                value: "first",
            }),
            Box::new(LabelStamp {
                key: "tier",
                value: "second",
            }),
        ];

        apply_task_processors(&processors, &run_spec, &mut task_info);
        // Later registrations win on conflicting keys.
        assert_eq!(task_info.labels.get("tier").unwrap(), "second");
    }
}
