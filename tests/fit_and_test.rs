use std::path::Path;

use image::{GrayImage, Luma};

use ferrite_captcha::logger::experiment::{read_scalars, FIGURES_DIR, SCALARS_FILE};
use ferrite_captcha::train::module::TEST_ACCURACY;
use ferrite_captcha::{Charset, ExperimentConfig, Network, RunDirectory, Trainer};

/// Left half encodes the first character, right half the second
/// (`a` = white, `b` = grey, missing = black).
fn shade(ch: Option<char>) -> u8 {
    match ch {
        Some('a') => 255,
        Some('b') => 128,
        _ => 0,
    }
}

fn write_dataset(dir: &Path) {
    for label in ["a", "b", "ab", "ba", "aa", "bb"] {
        let mut chars = label.chars();
        let (first, second) = (shade(chars.next()), shade(chars.next()));
        let img = GrayImage::from_fn(8, 4, |x, _| Luma([if x < 4 { first } else { second }]));
        for copy in 0..8 {
            img.save(dir.join(format!("{label}_{copy}.png"))).unwrap();
        }
    }
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let data_dir = root.join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    write_dataset(&data_dir);

    let config = serde_json::json!({
        "data": {
            "data_dir": data_dir,
            "split": [0.5, 0.25, 0.25],
            "charset": "ab",
            "width": 8,
            "height": 4,
            "max_len": 2,
            "batch_size": 8,
            "seed": 11
        },
        "net": { "hidden": [ { "size": 16, "activation": "Tanh" } ] },
        "losses": [
            { "tag": "cross_entropy", "kind": "cross_entropy" },
            { "tag": "mse", "weight": 0.5, "kind": "mse" }
        ],
        "optimizer": { "type": "adam", "lr": 0.01 },
        "scheduler": { "type": "reduce_on_plateau", "patience": 2 },
        "compile": true,
        "trainer": { "max_epochs": 15, "visualize_every": 1 },
        "run_dir": root.join("run")
    });
    let path = root.join("config.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn test_fit_then_test_writes_a_complete_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ExperimentConfig::load(write_config(tmp.path())).unwrap();
    let splits = config.load_splits().unwrap();
    assert_eq!(splits.train.dataset().len(), 24);
    assert_eq!(splits.val.dataset().len(), 12);
    assert_eq!(splits.test.dataset().len(), 12);

    let mut module = config.build_module(config.build_network().unwrap()).unwrap();
    let experiment = RunDirectory::create(&config.run_dir).unwrap();
    let mut trainer = Trainer::new(config.trainer_config(), experiment);

    let history = trainer.fit(&mut module, &splits.train, Some(&splits.val)).unwrap();
    assert_eq!(history.len(), 15);
    assert!(module.net().is_compiled());
    assert!(history[14].train_loss < history[0].train_loss);
    assert!(history.iter().all(|s| s.val_loss.is_some()));

    let metrics = trainer.test(&mut module, &splits.test).unwrap();
    let accuracy = metrics.get(TEST_ACCURACY).unwrap();
    assert!((0.0..=100.0).contains(&accuracy));
    drop(trainer);

    let run = &config.run_dir;
    assert!(run.join(SCALARS_FILE).exists());
    let scalars = read_scalars(run).unwrap();
    for tag in ["train/total_loss", "train/cross_entropy", "train/mse", "val/total_loss", "val/Accuracy", "Accuracy", "lr"] {
        assert!(scalars.iter().any(|s| s.tag == tag), "missing {tag}");
    }
    assert!(scalars.iter().any(|s| s.tag == TEST_ACCURACY));
    let figures = std::fs::read_dir(run.join(FIGURES_DIR)).unwrap().count();
    assert!(figures >= 15);

    let best = Network::load_json(config.checkpoint_path()).unwrap();
    let meta = best.metadata.clone().unwrap();
    assert_eq!((meta.charset.as_str(), meta.width, meta.height, meta.max_len), ("ab", 8, 4, 2));
    let charset = Charset::new(&meta.charset, meta.max_len).unwrap();
    let sample = &splits.test.dataset().samples[0];
    let decoded = charset.decode(&best.predict(std::slice::from_ref(&sample.image)).argmax(0));
    assert!(decoded.len() <= 2);
}

#[test]
fn test_missing_data_dir_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ExperimentConfig::load(write_config(tmp.path())).unwrap();
    config.data.data_dir = tmp.path().join("does-not-exist");
    assert!(matches!(config.load_splits(), Err(ferrite_captcha::Error::Io(_))));
}
