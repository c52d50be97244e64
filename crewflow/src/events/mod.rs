//! Event sink system for observability.
//!
//! The pipeline runner reports its lifecycle through an [`EventSink`]:
//!
//! | event                | data                                   |
//! |----------------------|----------------------------------------|
//! | `pipeline.started`   | `run_id`, `topic`, `stages`            |
//! | `stage.started`      | `stage`, `index`                       |
//! | `stage.retrying`     | `stage`, `attempt`, `delay_ms`, `kind` |
//! | `stage.completed`    | `stage`, `retries`, `duration_ms`      |
//! | `stage.failed`       | `stage`, `retries`, `duration_ms`, `kind`, `error` |
//! | `pipeline.completed` | `run_id`, `duration_ms`                |
//! | `pipeline.failed`    | `run_id`, `stage`, `error`             |

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
