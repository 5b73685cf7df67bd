//! Fixed page templates served to the browsers under test. The pages are
//! the workload: looping video, perpetual CSS animation, and an unbounded
//! JavaScript computation loop.

/// A video payload offered to the `<video>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    /// File name under the served media directory.
    pub file_name: String,
    /// MIME subtype for the `type` attribute (`webm`, `mp4`, ...).
    pub mime_subtype: String,
}

impl VideoSource {
    /// Derive a source entry from a media file name; the extension doubles
    /// as the MIME subtype, matching how the payloads are produced.
    pub fn from_file_name(file_name: &str) -> VideoSource {
        let mime_subtype = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "webm".into());
        VideoSource {
            file_name: file_name.to_string(),
            mime_subtype,
        }
    }
}

/// Render the video workload page. Playback is muted and looped; the script
/// retries `video.play()` a bounded number of times to get past autoplay
/// policies, then falls back to the first click (real or simulated).
pub fn video_page(sources: &[VideoSource], autoplay_retries: u32) -> String {
    let source_tags: String = sources
        .iter()
        .map(|source| {
            format!(
                "        <source src=\"/media/{}\" type=\"video/{}\">\n",
                source.file_name, source.mime_subtype
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Browser Power Test - Video</title>
    <style>
        body {{ margin: 0; padding: 0; background-color: black; }}
        video {{ width: 100%; height: 100vh; }}
    </style>
    <script>
        window.onload = function() {{
            var video = document.querySelector('video');
            var attempts = 0;

            function tryPlay() {{
                var playPromise = video.play();
                if (playPromise !== undefined) {{
                    playPromise.then(function() {{
                        console.log('Autoplay started successfully');
                    }}).catch(function(error) {{
                        console.log('Autoplay failed: ' + error);
                        attempts += 1;
                        if (attempts < {autoplay_retries}) {{
                            setTimeout(tryPlay, 1000);
                        }} else {{
                            document.addEventListener('click', function() {{
                                video.play();
                            }}, {{ once: true }});
                        }}
                    }});
                }}
            }}

            tryPlay();

            video.addEventListener('pause', function() {{
                video.play();
            }});

            video.addEventListener('ended', function() {{
                video.currentTime = 0;
                video.play();
            }});
        }}
    </script>
</head>
<body>
    <video muted autoplay loop playsinline>
{source_tags}    </video>
</body>
</html>
"#
    )
}

pub const ANIMATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Browser Animation Test</title>
    <style>
        body {
            margin: 0;
            padding: 0;
            background-color: white;
            overflow: hidden;
        }
        #container {
            width: 100vw;
            height: 100vh;
            position: relative;
        }
        .animate-box {
            position: absolute;
            width: 50px;
            height: 50px;
            background-color: blue;
            border-radius: 5px;
            animation: move 4s infinite;
        }
        @keyframes move {
            0% { transform: translate(0, 0); background-color: blue; }
            25% { transform: translate(calc(100vw - 50px), 0); background-color: red; }
            50% { transform: translate(calc(100vw - 50px), calc(100vh - 50px)); background-color: green; }
            75% { transform: translate(0, calc(100vh - 50px)); background-color: orange; }
            100% { transform: translate(0, 0); background-color: blue; }
        }
    </style>
</head>
<body>
    <div id="container">
        <script>
            for (let i = 0; i < 100; i++) {
                const box = document.createElement('div');
                box.className = 'animate-box';
                box.style.animationDelay = (i * 0.1) + 's';
                document.getElementById('container').appendChild(box);
            }
        </script>
    </div>
</body>
</html>
"#;

pub const JS_COMPUTATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Browser CPU Test</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            margin: 20px;
            padding: 0;
        }
        #status {
            font-size: 18px;
            margin-bottom: 20px;
        }
        #result {
            font-family: monospace;
            white-space: pre;
            border: 1px solid #ccc;
            padding: 10px;
            height: 300px;
            overflow-y: auto;
        }
    </style>
</head>
<body>
    <h1>Browser CPU Load Test</h1>
    <div id="status">Running continuous calculations...</div>
    <div id="result"></div>

    <script>
        const resultDiv = document.getElementById('result');
        const statusDiv = document.getElementById('status');

        function runMatrixOperations() {
            const size = 300;
            const matrix1 = [];
            const matrix2 = [];

            for (let i = 0; i < size; i++) {
                matrix1[i] = [];
                matrix2[i] = [];
                for (let j = 0; j < size; j++) {
                    matrix1[i][j] = Math.random();
                    matrix2[i][j] = Math.random();
                }
            }

            const result = [];
            for (let i = 0; i < size; i++) {
                result[i] = [];
                for (let j = 0; j < size; j++) {
                    result[i][j] = 0;
                    for (let k = 0; k < size; k++) {
                        result[i][j] += matrix1[i][k] * matrix2[k][j];
                    }
                }
            }

            return result;
        }

        function calculatePrimes(max) {
            const primes = [];
            for (let i = 2; i <= max; i++) {
                let isPrime = true;
                for (let j = 2; j <= Math.sqrt(i); j++) {
                    if (i % j === 0) {
                        isPrime = false;
                        break;
                    }
                }
                if (isPrime) {
                    primes.push(i);
                }
            }
            return primes;
        }

        let iterationCount = 0;
        function runContinuousCalculations() {
            iterationCount++;

            if (iterationCount % 5 === 0) {
                const primes = calculatePrimes(10000);
                resultDiv.textContent = `Iteration ${iterationCount}\nFound ${primes.length} prime numbers up to 10000\n`;
            } else {
                const startTime = performance.now();
                runMatrixOperations();
                const endTime = performance.now();

                resultDiv.textContent = `Iteration ${iterationCount}\nMatrix operation completed in ${(endTime - startTime).toFixed(2)} ms\n`;
            }

            statusDiv.textContent = `Running continuous calculations... (Iteration: ${iterationCount})`;

            setTimeout(runContinuousCalculations, 100);
        }

        runContinuousCalculations();
    </script>
</body>
</html>
"#;

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Browser Power Test</title>
    <meta http-equiv="refresh" content="0; url=video.html">
</head>
<body>
    <p>Redirecting to <a href="video.html">video test</a>...</p>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_page_lists_every_source() {
        let sources = vec![
            VideoSource::from_file_name("test_VP9.webm"),
            VideoSource::from_file_name("clip.mp4"),
        ];
        let page = video_page(&sources, 3);
        assert!(page.contains(r#"<source src="/media/test_VP9.webm" type="video/webm">"#));
        assert!(page.contains(r#"<source src="/media/clip.mp4" type="video/mp4">"#));
    }

    #[test]
    fn video_page_embeds_the_retry_budget() {
        let page = video_page(&[], 7);
        assert!(page.contains("attempts < 7"));
    }

    #[test]
    fn source_subtype_comes_from_the_extension() {
        assert_eq!(VideoSource::from_file_name("a.WebM").mime_subtype, "webm");
        assert_eq!(VideoSource::from_file_name("noext").mime_subtype, "webm");
    }

    #[test]
    fn index_page_redirects_to_the_video_test() {
        assert!(INDEX_HTML.contains(r#"content="0; url=video.html""#));
    }
}
