use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutexをロック（ポイズン状態でも中身を取り出す）
///
/// クリティカルセクションは失敗しうる処理の前に状態を整合させてから抜けるため、
/// パニック後の状態もそのまま使える
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 先頭から最大 `max_chars` 文字（バイトではなく文字単位）
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
