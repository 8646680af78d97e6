//! 包含 WebSocket 通信中使用的各种消息负载定义。
//!
//! 线格式示例：
//!
//! ```json
//! {"type":"PowerUsageUpdate","updates":[{"device":"SOLAR","power":-1200}]}
//! {"type":"Authenticate","username":"alice","password":"secret"}
//! {"type":"SetCharging","chargingState":{"type":"ChargingWithMaxPower","maxPower":7680}}
//! ```

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::enums::Device;

/// 充电桩手动充电功率的下限 (瓦)。
pub const MIN_CHARGING_POWER_WATTS: u32 = 1440;
/// 充电桩手动充电功率的上限 (瓦)。
pub const MAX_CHARGING_POWER_WATTS: u32 = 7680;

/// 单个设备的一次功率读数。
///
/// `power` 的符号是约定的一部分：负数表示设备正在发电 (向家庭供电)，
/// 正数表示设备正在耗电，绝对值单位为瓦。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub device: Device,
    pub power: i32,
}

impl Update {
    pub fn new(device: Device, power: i32) -> Self {
        Self { device, power }
    }

    /// 设备是否正在发电。
    pub fn is_producing(&self) -> bool {
        self.power < 0
    }

    /// 设备是否正在耗电。
    pub fn is_consuming(&self) -> bool {
        self.power > 0
    }
}

/// 期望的充电桩工作模式，由客户端下发给服务端。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ChargingState {
    NotCharging,
    /// 仅使用光伏富余功率充电。
    ChargingWithExcessPower,
    /// 以不超过 `max_power` 瓦的功率充电。
    ChargingWithMaxPower {
        #[serde(rename = "maxPower")]
        max_power: u32,
    },
}

impl ChargingState {
    /// 构造一个手动功率充电模式，功率被限制在充电桩支持的
    /// [`MIN_CHARGING_POWER_WATTS`, `MAX_CHARGING_POWER_WATTS`] 区间内。
    pub fn with_max_power(watts: u32) -> Self {
        ChargingState::ChargingWithMaxPower {
            max_power: watts.clamp(MIN_CHARGING_POWER_WATTS, MAX_CHARGING_POWER_WATTS),
        }
    }
}

/// 服务端 → 客户端的消息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Message {
    /// 各设备的最新功率读数，顺序与服务端发送时一致。
    PowerUsageUpdate { updates: Vec<Update> },
    /// 认证成功。
    Authenticated { username: String },
    /// 认证被拒绝。
    Unauthorized { username: String },
}

impl Message {
    /// 消息的类型标签，与线协议中的 `"type"` 字段一致。
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PowerUsageUpdate { .. } => "PowerUsageUpdate",
            Message::Authenticated { .. } => "Authenticated",
            Message::Unauthorized { .. } => "Unauthorized",
        }
    }

    /// 在功率更新中查找指定设备的读数；同一设备出现多次时取最后一次。
    pub fn power_of(&self, device: Device) -> Option<i32> {
        match self {
            Message::PowerUsageUpdate { updates } => updates
                .iter()
                .rev()
                .find(|update| update.device == device)
                .map(|update| update.power),
            Message::Authenticated { .. } | Message::Unauthorized { .. } => None,
        }
    }
}

/// 客户端 → 服务端的命令。
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    SetCharging {
        #[serde(rename = "chargingState")]
        charging_state: ChargingState,
    },
    /// 连接建立后的首条消息。密码在这一层以明文传输。
    Authenticate { username: String, password: String },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SetCharging { .. } => "SetCharging",
            ClientMessage::Authenticate { .. } => "Authenticate",
        }
    }
}

// 手写 Debug，避免密码出现在日志里。
impl fmt::Debug for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::SetCharging { charging_state } => f
                .debug_struct("SetCharging")
                .field("charging_state", charging_state)
                .finish(),
            ClientMessage::Authenticate { username, .. } => f
                .debug_struct("Authenticate")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// 生成一条随机的功率更新，每个设备一条读数。
///
/// 取值区间：光伏 -5000..0，电池 -5000..5000，充电桩 0..7500，
/// 热泵 0..5000，电网 -5000..5000。供模拟服务端推送遥测数据使用。
pub fn random_power_usage_update() -> Message {
    let mut rng = rand::thread_rng();
    Message::PowerUsageUpdate {
        updates: vec![
            Update::new(Device::Solar, rng.gen_range(-5000..0)),
            Update::new(Device::Battery, rng.gen_range(-5000..5000)),
            Update::new(Device::CarCharger, rng.gen_range(0..7500)),
            Update::new(Device::Heatpump, rng.gen_range(0..5000)),
            Update::new(Device::Grid, rng.gen_range(-5000..5000)),
        ],
    }
}
