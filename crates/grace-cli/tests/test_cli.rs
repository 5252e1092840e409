use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;

fn get_test_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target/tmp/tests").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a 30-paper Cora-format dataset: three topics, six words, a ring of
/// citations inside each topic.
fn write_tiny_cora(root: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let raw = root.join("cora");
    fs::create_dir_all(&raw)?;

    let topics = ["Neural_Networks", "Theory", "Genetic_Algorithms"];
    let mut content = String::new();
    let mut cites = String::new();
    for i in 0..30 {
        let topic = i % 3;
        let words: Vec<&str> = (0..6)
            .map(|w| if w / 2 == topic || (i + w) % 5 == 0 { "1" } else { "0" })
            .collect();
        content.push_str(&format!("{} {} {}\n", 1000 + i, words.join(" "), topics[topic]));
        cites.push_str(&format!("{} {}\n", 1000 + i, 1000 + (i + 3) % 30));
    }
    // unknown papers are skipped
    cites.push_str("1000 999999\n");

    fs::write(raw.join("cora.content"), content)?;
    fs::write(raw.join("cora.cites"), cites)?;
    Ok(())
}

#[test]
fn test_cli_train_and_evaluate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir("train");
    write_tiny_cora(&dir)?;
    let model_dir = dir.join("model");
    let embeddings = dir.join("emb.npy");

    let mut cmd = Command::cargo_bin("grace")?;
    cmd.arg("--dataset")
        .arg("Cora")
        .arg("--dataset_path")
        .arg(&dir)
        .arg("--best_model_path")
        .arg(&model_dir)
        .arg("--epochs")
        .arg("5")
        .arg("--hid_dim")
        .arg("8")
        .arg("--out_dim")
        .arg("4")
        .arg("--lr")
        .arg("0.01")
        .arg("--split")
        .arg("ratio")
        .arg("--train_ratio")
        .arg("0.3")
        .arg("--val_ratio")
        .arg("0.2")
        .arg("--eval_epochs")
        .arg("20")
        .arg("--eval_wd")
        .arg("1e-4")
        .arg("--embeddings_out")
        .arg(&embeddings);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Nodes:          30"))
        .stdout(predicate::str::contains("Classes:        3"))
        .stdout(predicate::str::contains("Isolated nodes: 0"))
        .stdout(predicate::str::contains("Test acc: "));

    assert!(model_dir.join("GRACE.safetensors").exists());
    assert!(model_dir.join("GRACE.json").exists());
    assert!(embeddings.exists());
    Ok(())
}

#[test]
fn test_cli_prelu_with_blocked_loss() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir("prelu");
    write_tiny_cora(&dir)?;

    let mut cmd = Command::cargo_bin("grace")?;
    cmd.arg("--dataset_path")
        .arg(&dir)
        .arg("--best_model_path")
        .arg(dir.join("model"))
        .arg("--epochs")
        .arg("3")
        .arg("--hid_dim")
        .arg("8")
        .arg("--out_dim")
        .arg("4")
        .arg("--num_layers")
        .arg("1")
        .arg("--activation")
        .arg("prelu")
        .arg("--loss_batch_size")
        .arg("7")
        .arg("--split")
        .arg("ratio")
        .arg("--eval_epochs")
        .arg("5");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Test acc: "));
    Ok(())
}

#[test]
fn test_cli_unknown_dataset() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("grace")?;
    cmd.arg("--dataset").arg("Reddit");
    cmd.assert().failure().stderr(predicate::str::contains("Reddit"));
    Ok(())
}

#[test]
fn test_cli_missing_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir("missing");

    let mut cmd = Command::cargo_bin("grace")?;
    cmd.arg("--dataset")
        .arg("CiteSeer")
        .arg("--dataset_path")
        .arg(&dir)
        .arg("--best_model_path")
        .arg(dir.join("model"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load CiteSeer"));
    Ok(())
}

#[test]
fn test_cli_rejects_bad_rate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir("bad_rate");
    write_tiny_cora(&dir)?;

    let mut cmd = Command::cargo_bin("grace")?;
    cmd.arg("--dataset_path")
        .arg(&dir)
        .arg("--drop_edge_rate_1")
        .arg("1.5");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid training configuration"));
    Ok(())
}
