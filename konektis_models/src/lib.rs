//! `konektis_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了客户端 (`konektis_client`) 与服务端 (`konektis_mock_server`
//! 以及真实的家庭能源服务器) 之间通过 WebSocket 交换的全部数据结构。
//!
//! - **通用枚举 (`enums`)**: 设备枚举 `Device`。
//! - **WebSocket 消息负载 (`ws_payloads`)**: 服务端 → 客户端的 `Message`，
//!   客户端 → 服务端的 `ClientMessage`，以及嵌套的 `Update` / `ChargingState`。
//!
//! 所有模型都派生 `Serialize` / `Deserialize`，并通过 `#[serde(tag = "type")]`
//! 以带标签联合体的形式编码。标签名称属于线协议的一部分，不可随意修改。
//! 具体的编解码入口 (含错误类型) 位于 `konektis_ws_utils::message`。

pub mod enums;
pub mod ws_payloads;

pub use enums::Device;
pub use ws_payloads::{ChargingState, ClientMessage, Message, Update};
