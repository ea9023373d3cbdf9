// 對外部系統的具體實作：REST 後端與記憶體內的假後端
pub mod http;
pub mod memory;
