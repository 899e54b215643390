//! 载荷摘要计算
//!
//! 对序列化后的载荷求 SHA-256，十六进制小写输出。相同的任务类型加
//! 参数产生相同摘要，去重索引以此为键。

use sha2::{Digest, Sha256};

pub fn payload_digest(handler: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(handler.as_bytes());
    format!("{:x}", hasher.finalize())
}
