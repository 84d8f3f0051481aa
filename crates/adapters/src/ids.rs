//! 고유 ID 생성

use rand::Rng;

use stagehand_core::IdGenerator;

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated ids.
pub const UNIQUE_ID_LEN: usize = 6;

/// 클라우드 자원 이름에 넣을 수 있는 짧은 base62 무작위 ID
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn unique_id(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..UNIQUE_ID_LEN)
            .map(|_| char::from(BASE62[rng.gen_range(0..BASE62.len())]))
            .collect()
    }
}
