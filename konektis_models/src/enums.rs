//! 通用枚举模块。
//!
//! 定义在客户端与服务端之间共享的封闭枚举类型。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 家庭能源系统中可上报功率的设备。
///
/// 线格式使用全大写蛇形命名 (`"SOLAR"`、`"CAR_CHARGER"` 等)，
/// 未知的设备名称在反序列化时直接报错，不会回退到某个默认设备。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Device {
    /// 光伏组件。
    Solar,
    /// 家用储能电池。
    Battery,
    /// 电动汽车充电桩。
    CarCharger,
    /// 热泵。
    Heatpump,
    /// 公共电网接入点。
    Grid,
}

impl Device {
    /// 全部设备，按线协议中的声明顺序排列。
    pub const ALL: [Device; 5] = [
        Device::Solar,
        Device::Battery,
        Device::CarCharger,
        Device::Heatpump,
        Device::Grid,
    ];

    /// 返回该设备在线协议中的名称。
    pub fn wire_name(&self) -> &'static str {
        match self {
            Device::Solar => "SOLAR",
            Device::Battery => "BATTERY",
            Device::CarCharger => "CAR_CHARGER",
            Device::Heatpump => "HEATPUMP",
            Device::Grid => "GRID",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 每个设备的 serde 名称必须与 `wire_name` 一致。
    fn test_device_serde_names_match_wire_names() {
        for device in Device::ALL {
            let json = serde_json::to_string(&device).expect("设备序列化失败");
            assert_eq!(json, format!("\"{}\"", device.wire_name()));
            let back: Device = serde_json::from_str(&json).expect("设备反序列化失败");
            assert_eq!(back, device);
        }
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        assert!(serde_json::from_str::<Device>("\"WIND_TURBINE\"").is_err());
        // 名称大小写敏感
        assert!(serde_json::from_str::<Device>("\"solar\"").is_err());
    }
}
