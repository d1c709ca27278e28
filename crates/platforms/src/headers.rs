//! Static HTTP headers the capture process must send per platform.
//!
//! Some CDNs reject pulls without the right origin/referer, so the command
//! builder forwards these to ffmpeg.

static HEADERS: &[(&str, &[(&str, &str)])] = &[
    ("huya", &[("referer", "https://www.huya.com")]),
    ("douyu", &[("referer", "https://www.douyu.com")]),
    (
        "bilibili",
        &[
            ("origin", "https://live.bilibili.com"),
            ("referer", "https://live.bilibili.com/"),
        ],
    ),
    ("douyin", &[("referer", "https://live.douyin.com")]),
    ("kuaishou", &[("referer", "https://live.kuaishou.com")]),
    ("acfun", &[("referer", "https://live.acfun.cn")]),
    ("weibo", &[("referer", "https://weibo.com")]),
    ("pandatv", &[("origin", "https://www.pandalive.co.kr")]),
    ("soop", &[("referer", "https://play.sooplive.co.kr")]),
];

/// Headers to attach when pulling a stream of `platform_key`.
pub fn headers_for(platform_key: &str) -> &'static [(&'static str, &'static str)] {
    HEADERS
        .iter()
        .find(|(key, _)| *key == platform_key)
        .map(|(_, headers)| *headers)
        .unwrap_or(&[])
}
