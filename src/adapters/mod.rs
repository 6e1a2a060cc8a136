//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                  |
//! |-------------|--------------------|------------------------------|
//! | `heat_call` | (output pin)       | embedded-hal `OutputPin`     |
//! | `log_sink`  | EventSink          | Serial log output            |
//! | `nvs`       | NonVolatileStore   | NVS blob / in-memory image   |
//! |             | ConfigPort         |                              |
//! | `sim`       | every board port   | Room model + `SimClock`      |
//! | `time`      | Clock              | Simulated or ESP-IDF RTC     |

pub mod heat_call;
pub mod log_sink;
pub mod nvs;
pub mod sim;
pub mod time;
