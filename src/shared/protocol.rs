use crate::domain::orderbook::Level;
use crate::shared::error::FeedError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 推送类型：全量快照或增量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Snapshot,
    Delta,
}

/// 订单簿推送的 data 部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookData {
    #[serde(rename = "s", alias = "symbol")]
    pub symbol: String,
    /// 买盘，价格降序
    #[serde(rename = "b", alias = "bids", default)]
    pub bids: Vec<Level>,
    /// 卖盘，价格升序
    #[serde(rename = "a", alias = "asks", default)]
    pub asks: Vec<Level>,
    #[serde(rename = "u", alias = "updateId")]
    pub update_id: u64,
    /// 跨序列号，仅用于诊断
    #[serde(default)]
    pub seq: u64,
}

/// Orderbook topic frame: `{ topic, type, ts, cts, data }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMessage {
    pub topic: String,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    /// 网关推送时间 (ms)
    pub ts: i64,
    /// 撮合引擎时间 (ms)
    #[serde(default)]
    pub cts: Option<i64>,
    pub data: BookData,
}

impl BookMessage {
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.data.symbol
    }

    #[inline]
    pub fn is_snapshot(&self) -> bool {
        self.update_type == UpdateType::Snapshot
    }

    /// Matching-engine time, falling back to the push time
    #[inline]
    pub fn engine_time(&self) -> i64 {
        self.cts.unwrap_or(self.ts)
    }
}

/// K线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub start: i64,
    pub end: i64,
    pub interval: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub turnover: Decimal,
    /// 该K线是否已收盘
    pub confirm: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineMessage {
    pub topic: String,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub ts: i64,
    #[serde(default)]
    pub cts: Option<i64>,
    pub data: Vec<Kline>,
}

/// 订阅/心跳应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionAck {
    pub success: bool,
    #[serde(default)]
    pub ret_msg: String,
    pub conn_id: String,
    #[serde(default)]
    pub req_id: Option<String>,
    pub op: String,
}

/// 一帧推送解码后的结果
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    Orderbook(BookMessage),
    Kline(KlineMessage),
    Ack(SubscriptionAck),
}

impl FeedFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedFrame::Orderbook(_) => "orderbook",
            FeedFrame::Kline(_) => "kline",
            FeedFrame::Ack(_) => "ack",
        }
    }
}

const DATA_KEYS: [&str; 3] = ["topic", "type", "ts"];
const ACK_KEYS: [&str; 3] = ["success", "conn_id", "op"];

/// Decode one text frame.
///
/// Frames carrying `topic`, `type` and `ts` are data; frames carrying
/// `success`, `conn_id` and `op` are acknowledgments. Anything else is
/// `FeedError::MalformedFrame`. Trailing NUL padding is ignored.
pub fn decode_frame(text: &str) -> Result<FeedFrame, FeedError> {
    let text = text.trim_end_matches('\0').trim();
    let value: Value = serde_json::from_str(text)?;

    let Some(object) = value.as_object() else {
        return Err(FeedError::MalformedFrame("frame is not a JSON object".to_string()));
    };
    let has_all = |keys: &[&str]| keys.iter().all(|key| object.contains_key(*key));

    if has_all(&DATA_KEYS) {
        let topic = object
            .get("topic")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // topic 形如 "orderbook.50.BTCUSDT" / "kline.1.BTCUSDT"
        match topic.split('.').next() {
            Some("orderbook") => Ok(FeedFrame::Orderbook(serde_json::from_value(value)?)),
            Some("kline") => Ok(FeedFrame::Kline(serde_json::from_value(value)?)),
            _ => Err(FeedError::MalformedFrame(format!("unsupported topic: {topic}"))),
        }
    } else if has_all(&ACK_KEYS) {
        Ok(FeedFrame::Ack(serde_json::from_value(value)?))
    } else {
        Err(FeedError::MalformedFrame(truncate(text, 120)))
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "topic": "orderbook.50.BTCUSDT",
        "type": "snapshot",
        "ts": 1672304484978,
        "cts": 1672304484976,
        "data": {
            "s": "BTCUSDT",
            "b": [["16493.50", "0.006"], ["16493.00", "0.100"]],
            "a": [["16611.00", "0.029"], ["16612.00", "0.213"]],
            "u": 18521288,
            "seq": 7961638724
        }
    }"#;

    #[test]
    fn test_decode_orderbook_snapshot() {
        let frame = decode_frame(SNAPSHOT).unwrap();
        let FeedFrame::Orderbook(msg) = frame else {
            panic!("expected orderbook frame");
        };
        assert!(msg.is_snapshot());
        assert_eq!(msg.symbol(), "BTCUSDT");
        assert_eq!(msg.data.update_id, 18521288);
        assert_eq!(msg.engine_time(), 1672304484976);
        assert_eq!(msg.data.bids[0].price, Decimal::new(1649350, 2));
        assert_eq!(msg.data.asks[1].size, Decimal::new(213, 3));
    }

    #[test]
    fn test_decode_long_field_names_and_padding() {
        let text = "{\"topic\":\"orderbook.1.ETHUSDT\",\"type\":\"delta\",\"ts\":5,\
                    \"data\":{\"symbol\":\"ETHUSDT\",\"bids\":[],\"asks\":[[\"1.5\",\"0\"]],\"updateId\":3}}\0\0\0";
        let FeedFrame::Orderbook(msg) = decode_frame(text).unwrap() else {
            panic!("expected orderbook frame");
        };
        assert_eq!(msg.update_type, UpdateType::Delta);
        assert_eq!(msg.engine_time(), 5);
        assert_eq!(msg.data.asks, vec![Level::new(Decimal::new(15, 1), Decimal::ZERO)]);
        assert_eq!(msg.data.seq, 0);
    }

    #[test]
    fn test_decode_kline() {
        let text = r#"{"topic":"kline.5.BTCUSDT","type":"snapshot","ts":1672324988882,
            "data":[{"start":1672324800000,"end":1672325099999,"interval":"5",
            "open":"16649.5","close":"16677","high":"16677","low":"16608",
            "volume":"2.081","turnover":"34666.4005","confirm":false,"timestamp":1672324988882}]}"#;
        let frame = decode_frame(text).unwrap();
        assert_eq!(frame.kind(), "kline");
        let FeedFrame::Kline(msg) = frame else { unreachable!() };
        assert_eq!(msg.data[0].close, Decimal::from(16677));
        assert!(!msg.data[0].confirm);
    }

    #[test]
    fn test_decode_ack() {
        let text = r#"{"success":true,"ret_msg":"subscribe","conn_id":"2324d924","req_id":"10001","op":"subscribe"}"#;
        let FeedFrame::Ack(ack) = decode_frame(text).unwrap() else {
            panic!("expected ack");
        };
        assert!(ack.success);
        assert_eq!(ack.op, "subscribe");
        assert_eq!(ack.req_id.as_deref(), Some("10001"));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode_frame(r#"{"hello":1}"#), Err(FeedError::MalformedFrame(_))));
        assert!(matches!(decode_frame("[1,2]"), Err(FeedError::MalformedFrame(_))));
        assert!(matches!(decode_frame("not json"), Err(FeedError::Decode(_))));
        assert!(matches!(
            decode_frame(r#"{"topic":"trade.BTCUSDT","type":"snapshot","ts":1}"#),
            Err(FeedError::MalformedFrame(_))
        ));
    }
}
