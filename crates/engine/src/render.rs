use crate::merge::MergePlan;
use crate::script::Project;
use crate::timeline::{ticks_to_secs, TICKS_PER_SECOND};
use std::path::{Path, PathBuf};

pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    pub output_path: PathBuf,
}

fn secs(ticks: i64) -> String {
    format!("{:.6}", ticks_to_secs(ticks))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Cut every scene slice out of the continuous recording, freeze its last
/// frame for the hold time, normalise size and rate, and concatenate.
pub fn video_track_command(
    plan: &MergePlan,
    project: &Project,
    recording: &Path,
    output_path: PathBuf,
) -> RenderCommand {
    let (w, h) = (project.resolution.width, project.resolution.height);
    let mut filter_parts = Vec::new();

    // [0:v]trim=start=1.2:end=3.4,setpts=PTS-STARTPTS,...,tpad=stop_mode=clone:stop_duration=0.8[v0]
    for (idx, seg) in plan.segments.iter().enumerate() {
        let mut chain = format!(
            "[0:v]trim=start={}:end={},setpts=PTS-STARTPTS,fps={},scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:(ow-iw)/2:(oh-ih)/2,setsar=1",
            secs(seg.source_start_ticks),
            secs(seg.source_end_ticks),
            project.fps,
            w,
            h,
            w,
            h
        );
        if seg.hold_ticks > 0 {
            chain.push_str(&format!(",tpad=stop_mode=clone:stop_duration={}", secs(seg.hold_ticks)));
        }
        chain.push_str(&format!("[v{}]", idx));
        filter_parts.push(chain);
    }

    let inputs: String = (0..plan.segments.len()).map(|i| format!("[v{}]", i)).collect();
    filter_parts.push(format!("{}concat=n={}:v=1:a=0[outv]", inputs, plan.segments.len()));

    let args = vec![
        "-i".to_string(),
        path_arg(recording),
        "-filter_complex".to_string(),
        filter_parts.join(";"),
        "-map".to_string(),
        "[outv]".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "slow".to_string(),
        "-b:v".to_string(),
        project.bitrate.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        project.fps.to_string(),
        "-y".to_string(),
        path_arg(&output_path),
    ];

    RenderCommand {
        ffmpeg_args: args,
        output_path,
    }
}

/// Lay narration clips and silences end to end. Lengths are exact in samples
/// since one tick is one sample at 48 kHz.
pub fn audio_track_command(plan: &MergePlan, output_path: PathBuf) -> RenderCommand {
    let mut input_args = Vec::new();
    let mut filter_parts = Vec::new();
    let mut input_idx = 0;

    for (idx, seg) in plan.segments.iter().enumerate() {
        let samples = seg.audio_ticks();
        let chain = match &seg.audio {
            Some(clip) => {
                input_args.push("-i".to_string());
                input_args.push(path_arg(&clip.path));
                let c = format!(
                    "[{}:a]aresample={},aformat=sample_fmts=s16:channel_layouts=stereo,apad=whole_len={},atrim=end_sample={},asetpts=PTS-STARTPTS[a{}]",
                    input_idx, TICKS_PER_SECOND, samples, samples, idx
                );
                input_idx += 1;
                c
            }
            None => format!(
                "anullsrc=r={}:cl=stereo,aformat=sample_fmts=s16,atrim=end_sample={},asetpts=PTS-STARTPTS[a{}]",
                TICKS_PER_SECOND, samples, idx
            ),
        };
        filter_parts.push(chain);
    }

    let inputs: String = (0..plan.segments.len()).map(|i| format!("[a{}]", i)).collect();
    filter_parts.push(format!("{}concat=n={}:v=0:a=1[outa]", inputs, plan.segments.len()));

    let mut args = input_args;
    args.push("-filter_complex".to_string());
    args.push(filter_parts.join(";"));
    args.push("-map".to_string());
    args.push("[outa]".to_string());
    args.push("-c:a".to_string());
    args.push("pcm_s16le".to_string());
    args.push("-ar".to_string());
    args.push(TICKS_PER_SECOND.to_string());
    args.push("-y".to_string());
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
    }
}

/// Combine the two tracks into the final container without re-encoding video.
pub fn mux_command(video_track: &Path, audio_track: &Path, output_path: PathBuf) -> RenderCommand {
    let args = vec![
        "-i".to_string(),
        path_arg(video_track),
        "-i".to_string(),
        path_arg(audio_track),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        path_arg(&output_path),
    ];
    RenderCommand {
        ffmpeg_args: args,
        output_path,
    }
}
