//! Terminal dashboard for livestream statistics.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | `view`       | filters, pagination maths, query-string mirroring      |
//! | `controller` | page cache, in-flight tracking, KPI sweep bookkeeping  |
//! | `poller`     | single cancellable task for countdown and refetch      |
//! | `session`    | event loop running fetches off the input path          |
//! | `command`    | line commands typed by the user                        |
//! | `render`     | comfy-table screen output                              |

pub mod command;
pub mod controller;
pub mod poller;
pub mod render;
pub mod session;
pub mod view;

pub use command::{Command, CommandError};
pub use controller::{LoadState, ViewController};
pub use poller::{PollEvent, PollKind, Poller};
pub use render::render_dashboard;
pub use session::{Flow, Session};
pub use view::{FilterPatch, Pagination, StreamFilters};
